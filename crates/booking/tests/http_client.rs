use mesa_booking::{
    AvailabilityQuery, BookingApi, BookingError, GetInClient, ReservationFilters,
    ReservationPayload,
};
use mesa_core::config::BookingConfig;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serves exactly one canned response and reports the raw request it saw.
async fn serve_once(status: u16, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    let (sender, receiver) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let read = socket.read(&mut chunk).await.expect("read");
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if request_complete(&buffer) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();
        let _ = sender.send(String::from_utf8_lossy(&buffer).into_owned());
    });

    (format!("http://{address}"), receiver)
}

fn request_complete(buffer: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buffer);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    buffer.len() >= header_end + 4 + content_length
}

fn client(base_url: &str) -> GetInClient {
    GetInClient::new(&BookingConfig {
        base_url: base_url.to_string(),
        api_key: "partner-key".to_string().into(),
        default_unit_id: None,
        timeout_secs: 5,
    })
    .expect("client")
}

fn payload() -> ReservationPayload {
    ReservationPayload {
        unit_id: "VPzzDDPQ".to_string(),
        sector_id: "J1bqDWPO".to_string(),
        name: "Ana Souza".to_string(),
        mobile: "11999990000".to_string(),
        email: "ana@example.com".to_string(),
        people: 2,
        table_people: 2,
        date: "2025-03-10".to_string(),
        time: "20:00".to_string(),
        info: None,
        discount: None,
        custom_fields: None,
        highlighted: None,
    }
}

#[tokio::test]
async fn availability_sends_api_key_and_query() {
    let (base_url, seen) = serve_once(200, r#"{"success":true,"data":[]}"#).await;
    let query =
        AvailabilityQuery { date: "2025-03-10".to_string(), hour: "20:00".to_string(), people: 2 };

    let body = client(&base_url).unit_availability("VPzzDDPQ", &query).await.expect("ok");
    let request = seen.await.expect("request");

    assert_eq!(body["success"], true);
    assert!(request.starts_with("GET /schedules/units/VPzzDDPQ?"));
    assert!(request.contains("date=2025-03-10"));
    assert!(request.contains("hour=20%3A00"));
    assert!(request.contains("people=2"));
    assert!(request.to_ascii_lowercase().contains("apikey: partner-key"));
}

#[tokio::test]
async fn create_posts_json_payload() {
    let (base_url, seen) =
        serve_once(201, r#"{"success":true,"data":{"id":"r-1","status":"PENDING"}}"#).await;

    let body = client(&base_url).create_reservation(&payload()).await.expect("created");
    let request = seen.await.expect("request");

    assert_eq!(body["data"]["id"], "r-1");
    assert!(request.starts_with("POST /reservations "));
    assert!(request.contains(r#""time":"20:00""#));
    assert!(request.contains(r#""table_people":2"#));
}

#[tokio::test]
async fn error_status_surfaces_backend_message() {
    let (base_url, _seen) =
        serve_once(422, r#"{"success":false,"message":"Setor indisponível"}"#).await;

    let error = client(&base_url).create_reservation(&payload()).await.expect_err("422");
    match error {
        BookingError::Api { status, message, body } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Setor indisponível");
            assert_eq!(body, json!({"success": false, "message": "Setor indisponível"}));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn reservation_listing_rejects_non_list_data() {
    let (base_url, seen) = serve_once(200, r#"{"data":{"id":"r-1"}}"#).await;
    let filters =
        ReservationFilters { mobile: Some("11999990000".to_string()), ..Default::default() };

    let error = client(&base_url).list_reservations(&filters).await.expect_err("not a list");
    let request = seen.await.expect("request");

    assert_eq!(error.status(), Some(200));
    assert!(request.starts_with("GET /reservations?mobile=11999990000"));
}

#[tokio::test]
async fn next_reservation_passes_single_object_through() {
    let (base_url, seen) =
        serve_once(200, r#"{"success":true,"data":{"id":"r-9","status":"pending"}}"#).await;
    let filters =
        ReservationFilters { email: Some("ana@example.com".to_string()), ..Default::default() };

    let page = client(&base_url).next_reservations(&filters).await.expect("next reservation");
    let request = seen.await.expect("request");

    assert_eq!(page.reservations, vec![json!({"id": "r-9", "status": "pending"})]);
    assert_eq!(page.raw["data"]["id"], "r-9");
    assert!(request.starts_with("GET /reservations/next?email=ana%40example.com"));
}

#[tokio::test]
async fn unreachable_backend_reports_status_zero() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");
    drop(listener);

    let error = client(&format!("http://{address}"))
        .list_reservations(&ReservationFilters::default())
        .await
        .expect_err("connection refused");

    assert_eq!(error.status(), Some(0));
    assert!(error.to_string().contains("Network error calling GET IN API"));
}
