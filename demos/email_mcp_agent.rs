//! An internal business agent that hands email work to an assistant. Both
//! agents share one MCP web-fetch server; the assistant sends the email and
//! returns what it sent as an `OutgoingEmail`.

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::marketplace::{email_address_tool, time_tool};
use apprise_agents::schemas::OutgoingEmail;
use apprise_agents::{
    Agent, Handoff, Mailer, McpServerParams, McpServerStdio, Runner, SendEmailTool,
};
use std::sync::Arc;

const EMAIL_INSTRUCTIONS: &str = "You are an assistant responsible for sending professional, \
well-formatted emails.

Use the tools in this sequence, calling each one only once:
- get_time, for dates such as the product launch date.
- get_email_address, for the recipient. Never guess or hardcode an address.
- send_email, with the full, polished email content.

The email must be clear, concise and accurate. After send_email returns, answer with the \
email you sent as JSON. If the mail tool reports an error, still answer with the email.";

const TRIAGE_INSTRUCTIONS: &str = "You are the internal business agent, designed to help \
employees with their work.

If the employee asks for help with emails, hand off to the EmailAssistant.
For general questions about products, answer directly.
Always be polite and helpful.";

const REQUEST: &str = "Hello, I need to create a marketing email for the new product launch. \
Please talk about the Model Context Protocol (MCP) and the new product called AI agents.

To make sure you are informed about the protocol, research the web for the latest news. \
https://modelcontextprotocol.io/introduction is a good start.

Also include the date the new product is going to be released within the email.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let mailer = Mailer::from_settings(&settings);
    if !mailer.is_configured() {
        println!("Mail is not configured; send attempts will report the missing setting.");
    }
    let recipient = settings
        .mail_from_address()
        .map(str::to_string)
        .unwrap_or_else(|_| "host@apprisemarketplace.com".to_string());

    let web_fetch =
        McpServerStdio::new("mcp_web_fetch", McpServerParams::new("uvx").arg("mcp-server-fetch"));

    let result = web_fetch
        .scoped(|server| async move {
            let email_agent = Agent::simple("EmailAssistant", EMAIL_INSTRUCTIONS)
                .with_model(settings.default_model.clone())
                .with_handoff_description("Writes and sends emails for employees")
                .with_mcp_server(server.clone())
                .with_tools(vec![
                    time_tool(),
                    email_address_tool(recipient),
                    Arc::new(SendEmailTool::new(mailer)),
                ])
                .with_output_type::<OutgoingEmail>();

            let triage = Agent::simple("Internal Business Agent", TRIAGE_INSTRUCTIONS)
                .with_model(settings.default_model.clone())
                .with_mcp_server(server)
                .with_handoff(Handoff::to(email_agent))
                .build()?;

            Runner::run(triage, REQUEST, settings.run_config()).await
        })
        .await?;

    println!("Answered by {}", result.last_agent);
    match result.final_output_as::<OutgoingEmail>() {
        Ok(email) => {
            println!("To: {}", email.to_emails.join(", "));
            println!("Subject: {}\n", email.subject);
            println!("{}", email.plain_text_body);
        }
        Err(_) => println!("{}", result.final_text()),
    }
    Ok(())
}
