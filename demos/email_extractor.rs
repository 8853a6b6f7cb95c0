//! Structured extraction of an email into `EmailData`.

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::schemas::EmailData;
use apprise_agents::{Agent, Runner};

const SAMPLE_EMAIL: &str = "
From: Alex Johnson <alex.j@techcorp.com>
To: Team Development <team-dev@techcorp.com>
CC: Sarah Wong <sarah.w@techcorp.com>, Miguel Fernandez <miguel.f@techcorp.com>
Subject: Project Phoenix Update and Next Steps

Hi team,

I wanted to follow up on yesterday's discussion about Project Phoenix and outline our next steps.

Key points from our discussion:
- The beta testing phase has shown promising results with 85% positive feedback
- We're still facing some performance issues on mobile devices
- The client has requested additional features for the dashboard

Let's schedule a follow-up meeting this Friday, June 15th at 2:00 PM in Conference Room B. \
The meeting should last about 1.5 hours, and we'll need to prepare the updated project timeline.

Action items:
1. Sarah to address the mobile performance issues by June 20th (High priority)
2. Miguel to create mock-ups for the new dashboard features by next Monday
3. Everyone to review the beta testing feedback document and add comments by EOD tomorrow

If you have any questions before Friday's meeting, feel free to reach out.

Best regards,
Alex Johnson
Senior Project Manager
(555) 123-4567
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let extractor = Agent::simple(
        "Email Extractor",
        "You are an assistant that extracts structured information from emails.
When given an email, carefully identify:
- Subject and main points
- People mentioned (names, roles, contact info)
- Meetings (dates, times, locations)
- Tasks or action items (with assignees and deadlines)
- Next steps or follow-ups

Extract this information as structured data. If something is unclear or not mentioned, \
leave those fields empty rather than making assumptions.",
    )
    .with_model(settings.default_model.clone())
    .with_output_type::<EmailData>()
    .build()?;

    let request = format!("Please extract information from this email:\n\n{SAMPLE_EMAIL}");
    let result = Runner::run(extractor, request, settings.run_config()).await?;
    let email: EmailData = result.final_output_as()?;
    print!("{}", email.summary());
    Ok(())
}
