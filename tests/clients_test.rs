//! HTTP 客户端测试（wiremock 模拟远程 API）

use std::time::Duration;

use autorizacion_worker::clients::{LedgerApi, LedgerClient, QueueApi, QueueClient};
use autorizacion_worker::config::LedgerSettings;
use autorizacion_worker::error::{ApiError, AppError, LedgerError};
use autorizacion_worker::infrastructure::TenantCipher;
use autorizacion_worker::models::{CaseStatus, SchedulingState, SchedulingUpdate};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CIPHER_KEY: &str = "clave-de-prueba";
const CIPHER_SALT: &str = "sal-de-prueba";

fn queue_client(server: &MockServer) -> QueueClient {
    QueueClient::with_base_url(&server.uri(), Duration::from_secs(5)).unwrap()
}

fn ledger_client(server: &MockServer) -> LedgerClient {
    let settings = LedgerSettings {
        base_url: server.uri(),
        cipher_key: CIPHER_KEY.to_string(),
        cipher_salt: CIPHER_SALT.to_string(),
        allowed_tenants: Vec::new(),
    };
    LedgerClient::from_settings(&settings, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_pending_orders_reads_programaciones() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/programacion-ordenes"))
        .and(query_param("estado", "PENDIENTE"))
        .and(query_param("per_page", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "programaciones": [
                    {"id_item_orden_proced": 10, "estado": "PENDIENTE", "intentos_realizados": 0, "intentos_maximos": 2},
                    {"id_item_orden_proced": 11, "estado": "PENDIENTE", "intentos_realizados": "1", "intentos_maximos": null}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orders = queue_client(&server).pending_orders(25).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].order_item_id, 10);
    assert_eq!(orders[1].attempts_made(), 1);
    assert_eq!(orders[1].attempts_max(2), 2);
}

#[tokio::test]
async fn test_pending_orders_tolerates_missing_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/programacion-ordenes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "sin datos"})))
        .mount(&server)
        .await;

    let orders = queue_client(&server).pending_orders(10).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_order_detail_takes_first_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lis-pacientes-ordeneshc/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"Nombre1": "Ana", "Apellido1": "Pérez", "NoDocumento": 1234567, "idOrden": "88", "campoExtra": "x"},
                {"Nombre1": "Otro"}
            ]
        })))
        .mount(&server)
        .await;

    let detail = queue_client(&server).order_detail(10).await.unwrap().unwrap();
    assert_eq!(detail.first_name.as_deref(), Some("Ana"));
    assert_eq!(detail.document_number.as_deref(), Some("1234567"));
    assert_eq!(detail.extra.get("campoExtra"), Some(&json!("x")));
}

#[tokio::test]
async fn test_order_detail_missing_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lis-pacientes-ordeneshc/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lis-pacientes-ordeneshc/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let client = queue_client(&server);
    assert!(client.order_detail(404).await.unwrap().is_none());
    assert!(client.order_detail(5).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_scheduling_sends_only_set_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/programacion-ordenes/item/10"))
        .and(body_json(json!({
            "estado": "PENDIENTE",
            "intentos_realizados": 1,
            "mensaje_error": "timeout"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let update = SchedulingUpdate::new(SchedulingState::Pending)
        .attempts(1)
        .error("timeout");
    queue_client(&server)
        .update_scheduling(10, &update)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_case_status_sends_code_and_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/h-itemordenesproced/10/estadoCaso"))
        .and(body_json(json!({"estadoCaso": 1, "numeroAutorizacion": "555"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    queue_client(&server)
        .update_case_status(10, CaseStatus::Success, Some("555".to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_bad_status_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/h-itemordenesproced/10/estadoCaso"))
        .respond_with(ResponseTemplate::new(500).set_body_string("fallo interno"))
        .mount(&server)
        .await;

    let err = queue_client(&server)
        .update_case_status(10, CaseStatus::Claimed, None)
        .await
        .unwrap_err();
    match err {
        AppError::Api(ApiError::BadStatus { status, body, .. }) => {
            assert_eq!(status, 500);
            assert!(body.contains("fallo interno"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_order_clears_confirmation_then_cancels() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/h-itemordenesproced/10/estadoCaso"))
        .and(body_json(json!({"estadoCaso": 99, "numeroAutorizacion": ""})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/programacion-ordenes/item/10"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    queue_client(&server)
        .cancel_order(10, "operador")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let scheduling: serde_json::Value = requests
        .iter()
        .find(|r| r.url.path() == "/programacion-ordenes/item/10")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    assert_eq!(scheduling["estado"], "cancelado");
    assert_eq!(scheduling["usuario_ejecuto"], "operador");
}

#[tokio::test]
async fn test_schedule_order_marks_scheduled_and_inserts_pending() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/h-itemordenesproced/10/estadoCaso"))
        .and(body_json(json!({"estadoCaso": 2})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/programacion-ordenes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    queue_client(&server)
        .schedule_order(10, "88", chrono::Local::now(), 2, "operador")
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let inserted: serde_json::Value = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    assert_eq!(inserted["estado"], "PENDIENTE");
    assert_eq!(inserted["intentos_maximos"], 2);
    assert_eq!(inserted["id_orden"], "88");
}

#[tokio::test]
async fn test_fetch_balance_decrypts_tenant() {
    let server = MockServer::start().await;
    let token = TenantCipher::new(CIPHER_KEY, CIPHER_SALT)
        .unwrap()
        .encrypt("IPS UNO");
    Mock::given(method("GET"))
        .and(path("/ips-saldos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"saldoRobot": "100", "valorCaso": 40, "Nbre": token}]
        })))
        .mount(&server)
        .await;

    let snapshot = ledger_client(&server).fetch_balance().await.unwrap();
    assert_eq!(snapshot.balance, 100.0);
    assert_eq!(snapshot.cost_per_case, 40.0);
    assert_eq!(snapshot.tenant_identity.as_deref(), Some("IPS UNO"));
}

#[tokio::test]
async fn test_fetch_balance_without_record_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ips-saldos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let err = ledger_client(&server).fetch_balance().await.unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::MissingRecord)));
}

#[tokio::test]
async fn test_write_balance_posts_new_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ips-saldos"))
        .and(body_json(json!({"saldoRobot": 60.0})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    ledger_client(&server).write_balance(60.0).await.unwrap();
}
