//! JS 执行器 - 基础设施层
//!
//! 持有会话页面的句柄，只暴露"执行 JS"的能力

use anyhow::{Context, Result};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// JS 执行器
///
/// 职责：
/// - 持有 Page 句柄
/// - 暴露 eval() 能力
/// - 不认识订单 / 会话状态
/// - 不处理业务流程
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 把 `function_body` 包装成 `async (input) => {...}` 并以 JSON 参数调用
    ///
    /// 脚本内部抛出的异常会被捕获，以 `{ status: "failure", message }` 返回，
    /// 这样页面上的错误文本能原样进入错误分类。
    pub async fn call_with<A, T>(&self, function_body: &str, input: &A) -> Result<T>
    where
        A: Serialize,
        T: DeserializeOwned,
    {
        let script = build_call_script(function_body, input)?;
        self.eval_as(script)
            .await
            .context("脚本执行或结果解析失败")
    }

    /// 判断 XPath 表达式在当前页面上是否有匹配
    pub async fn xpath_exists(&self, xpath: &str) -> Result<bool> {
        let xpath_json = serde_json::to_string(xpath)?;
        let script = format!(
            r#"
            (() => {{
                try {{
                    const r = document.evaluate({}, document, null,
                        XPathResult.FIRST_ORDERED_NODE_TYPE, null);
                    return r.singleNodeValue !== null;
                }} catch (err) {{
                    return false;
                }}
            }})()
            "#,
            xpath_json
        );
        self.eval_as(script).await
    }
}

/// 构建调用脚本
pub fn build_call_script<A: Serialize>(function_body: &str, input: &A) -> Result<String> {
    let input_json = serde_json::to_string(input)?;
    Ok(format!(
        r#"
        (async () => {{
            const input = {input};
            try {{
                const run = async (input) => {{
                    {body}
                }};
                const result = await run(input);
                return result === undefined ? null : result;
            }} catch (err) {{
                return {{ status: "failure", message: String(err && err.message ? err.message : err) }};
            }}
        }})()
        "#,
        input = input_json,
        body = function_body
    ))
}
