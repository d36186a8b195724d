//! Notification transports for validation messages.
//!
//! Each transport implements [`validation::Notifier`]: an SMS gateway client
//! for phone codes, a transactional mail API client for email links, and a
//! log-only transport for development.

mod error;
mod log;
mod mail;
mod sms;
mod types;

pub use error::NotifyError;
pub use log::LogTransport;
pub use mail::MailClient;
pub use sms::SmsGatewayClient;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;
    use validation::Notifier;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn create_sms_client(mock_server: &MockServer) -> SmsGatewayClient {
        SmsGatewayClient::new(mock_server.uri(), "+15550009999", TIMEOUT).unwrap()
    }

    fn create_mail_client(mock_server: &MockServer) -> MailClient {
        MailClient::new(
            mock_server.uri(),
            SecretString::new("test-key".into()),
            "noreply@id.example",
            Some("Registration".into()),
            "Confirm your email address",
            TIMEOUT,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sms_health_check_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = create_sms_client(&mock_server);
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_sms_health_check_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = create_sms_client(&mock_server);
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_send_sms() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/send"))
            .and(body_json(serde_json::json!({
                "message": "Your code is 123456",
                "number": "+15550009999",
                "recipients": ["+15550001111"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "timestamp": 1677652288000i64
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_sms_client(&mock_server);
        let result = client.send_sms("+15550001111", "Your code is 123456").await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_sms_empty_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/send"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&mock_server)
            .await;

        let client = create_sms_client(&mock_server);
        assert!(client.send_sms("+15550001111", "hi").await.is_ok());
    }

    #[tokio::test]
    async fn test_send_sms_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/send"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid recipient"))
            .mount(&mock_server)
            .await;

        let client = create_sms_client(&mock_server);
        let result = client.send_sms("+15550001111", "hi").await;

        assert!(matches!(result, Err(NotifyError::SendFailed(msg)) if msg == "Invalid recipient"));
    }

    #[tokio::test]
    async fn test_sms_notifier_maps_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/send"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = create_sms_client(&mock_server);
        let err = client.send("+15550001111", "hi").await.unwrap_err();

        assert_eq!(err.target, "+15550001111");
    }

    #[tokio::test]
    async fn test_send_mail() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/smtp/email"))
            .and(header("api-key", "test-key"))
            .and(body_json(serde_json::json!({
                "sender": {"email": "noreply@id.example", "name": "Registration"},
                "to": [{"email": "alice@example.com"}],
                "subject": "Confirm your email address",
                "textContent": "Open https://id.example/emailvalidation?k=abc"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "messageId": "<1@id.example>"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_mail_client(&mock_server);
        let result = client
            .send("alice@example.com", "Open https://id.example/emailvalidation?k=abc")
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_mail_bad_key() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v3/smtp/email"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = create_mail_client(&mock_server);
        let result = client.send_mail("alice@example.com", "text").await;

        assert!(matches!(result, Err(NotifyError::Api(_))));
    }

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        let transport = LogTransport;
        tokio_test::assert_ok!(transport.send("+15550001111", "code 123456").await);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_log_transport_keeps_body_out_of_info_logs() {
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(log.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogTransport
            .send("+15550001111", "Your code is 654321, key abc-key")
            .await
            .unwrap();

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("+15550001111"));
        assert!(!output.contains("654321"));
        assert!(!output.contains("abc-key"));
    }

    #[test]
    fn test_send_sms_request_serialization() {
        let request = SendSmsRequest {
            message: "hello".into(),
            number: "+15550009999".into(),
            recipients: vec!["+15550001111".into()],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"recipients\":[\"+15550001111\"]"));
    }
}
