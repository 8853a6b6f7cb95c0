//! The mail tool against a fixed-status transport and a local HTTP stub.

use std::sync::Arc;

use apprise_agents::mail::{FixedStatusTransport, MailConfig, MailMessage, MailTransport, SendGridTransport};
use apprise_agents::{Mailer, SendEmailTool, Tool};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// A client that ignores proxy settings from the environment.
fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Accept one request, answer with `status_line`, and hand back the raw request.
async fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = find(&buf, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&buf).to_string()
    });
    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn provider_202_is_success() {
    let tool = SendEmailTool::new(Mailer::new(Arc::new(FixedStatusTransport::new(202))));
    let result = tool
        .execute(json!({
            "to_email": "guest@example.com",
            "subject": "Your booking",
            "plain_text_content": "Confirmed for June 15th.",
        }))
        .await
        .unwrap();

    assert!(!result.is_error());
    assert_eq!(
        result.output,
        json!({
            "status": "success",
            "message": "Email sent successfully to guest@example.com",
            "status_code": 202,
        })
    );
}

#[tokio::test]
async fn provider_500_is_error_value() {
    let transport = FixedStatusTransport::new(500).with_body(r#"{"errors":[{"message":"boom"}]}"#);
    let tool = SendEmailTool::new(Mailer::new(Arc::new(transport)));
    let result = tool
        .execute(json!({
            "to_email": "guest@example.com",
            "subject": "Your booking",
            "plain_text_content": "Confirmed.",
        }))
        .await
        .unwrap();

    // The tool itself succeeded; the status inside reports the failure.
    assert!(!result.is_error());
    assert_eq!(result.output["status"], "error");
    assert_eq!(result.output["status_code"], 500);
    assert_eq!(result.output["message"], "Failed to send email.");
    assert_eq!(result.output["details"], r#"{"errors":[{"message":"boom"}]}"#);
}

#[tokio::test]
async fn sendgrid_transport_posts_v3_request() {
    let (endpoint, server) = one_shot_server("202 Accepted", "").await;
    let transport = SendGridTransport::with_client(
        direct_client(),
        MailConfig::new("SG.test-key", "bot@apprise.example").with_endpoint(endpoint),
    );
    let message = MailMessage::new(
        vec!["guest@example.com".into()],
        "Your booking",
        "Confirmed.",
        None,
    );

    let response = transport.deliver(&message).await.unwrap();
    assert_eq!(response.status, 202);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v3/mail/send HTTP/1.1"), "{request}");
    assert!(request.to_lowercase().contains("authorization: bearer sg.test-key"));
    let body_start = find(request.as_bytes(), b"\r\n\r\n").unwrap() + 4;
    let body: serde_json::Value = serde_json::from_str(&request[body_start..]).unwrap();
    assert_eq!(body["personalizations"][0]["to"][0]["email"], "guest@example.com");
    assert_eq!(body["from"]["email"], "bot@apprise.example");
    assert_eq!(body["content"][1]["value"], "Confirmed.");
}

#[tokio::test]
async fn sendgrid_rejection_carries_details() {
    let (endpoint, server) = one_shot_server("401 Unauthorized", "bad key").await;
    let mailer = Mailer::new(Arc::new(SendGridTransport::with_client(
        direct_client(),
        MailConfig::new("SG.wrong", "bot@apprise.example").with_endpoint(endpoint),
    )));

    let status = mailer.send("guest@example.com", "Hi", "Hello", None).await;
    server.await.unwrap();
    assert!(!status.is_success());
    assert_eq!(status.status_code, Some(401));
    assert_eq!(status.details.as_deref(), Some("bad key"));
}

#[tokio::test]
async fn unreachable_provider_is_exception_status() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mailer = Mailer::new(Arc::new(SendGridTransport::with_client(
        direct_client(),
        MailConfig::new("SG.key", "bot@apprise.example").with_endpoint(format!("http://{addr}")),
    )));
    let status = mailer.send("guest@example.com", "Hi", "Hello", None).await;
    assert_eq!(status.status_code, None);
    assert!(status.message.starts_with("An exception occurred:"), "{}", status.message);
}

#[tokio::test]
async fn business_agent_hands_email_work_to_assistant() {
    use apprise_agents::marketplace::email_address_tool;
    use apprise_agents::schemas::OutgoingEmail;
    use apprise_agents::{Agent, Handoff, RunConfig, Runner, ScriptedProvider};

    let email = json!({
        "to_emails": ["host@apprise.example"],
        "subject": "Introducing AI agents",
        "plain_text_body": "AI agents launch on June 1st.",
    });
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_tool_call("transfer_to_emailassistant", json!({}))
            .with_tool_call("get_email_address", json!({}))
            .with_tool_call(
                "send_email",
                json!({
                    "to_email": "host@apprise.example",
                    "subject": "Introducing AI agents",
                    "plain_text_content": "AI agents launch on June 1st.",
                }),
            )
            .with_message(email.to_string()),
    );
    let transport = Arc::new(FixedStatusTransport::new(202));

    let email_agent = Agent::simple("EmailAssistant", "Send the email.")
        .with_tools(vec![
            email_address_tool("host@apprise.example"),
            Arc::new(SendEmailTool::new(Mailer::new(transport.clone()))),
        ])
        .with_output_type::<OutgoingEmail>();
    let triage = Agent::simple("Internal Business Agent", "Hand email work to the EmailAssistant.")
        .with_handoff(Handoff::to(email_agent))
        .build()
        .unwrap();

    let result = Runner::run(
        triage,
        "Write a launch email",
        RunConfig::default().with_model_provider(provider.clone()),
    )
    .await
    .unwrap();

    assert_eq!(result.last_agent, "EmailAssistant");
    let sent: OutgoingEmail = result.final_output_as().unwrap();
    assert_eq!(sent.to_emails, vec!["host@apprise.example".to_string()]);
    assert_eq!(transport.sent()[0].subject, "Introducing AI agents");
    assert_eq!(
        provider.requests()[1].output_schema.as_deref(),
        Some("OutgoingEmail")
    );
}
