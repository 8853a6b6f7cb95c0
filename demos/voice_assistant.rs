//! The Apprise voice assistant.
//!
//! Audio goes through `arecord` and `aplay`. Where they are not installed the
//! microphone plays back two synthesized utterances and replies are kept in
//! memory.

use std::sync::Arc;

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::marketplace::support_tools;
use apprise_agents::prompt::prompt_with_handoff_instructions;
use apprise_agents::voice::{
    aplay_command, arecord_command, generate_tone, AudioSink, AudioSource, BufferSink,
    OpenAIVoice, PcmStreamSink, PcmStreamSource, ScriptedSource, TurnOutcome, VadConfig,
    VoicePipeline,
};
use apprise_agents::{Agent, Handoff};

fn specialist(name: &str, description: &str, focus: &str, model: &str) -> Agent {
    Agent::simple(
        name,
        prompt_with_handoff_instructions(&format!(
            "You're speaking to a human, so be polite and concise. {focus}"
        )),
    )
    .with_handoff_description(description)
    .with_model(model)
}

fn assistant(model: &str) -> apprise_agents::Result<Agent> {
    let booking = specialist(
        "Booking Specialist",
        "A specialist for booking-related inquiries and issues.",
        "You specialize in helping with booking issues on Apprise Marketplace. Help with booking \
processes, cancellations, modifications, and refunds.",
        model,
    );
    let host = specialist(
        "Host Support",
        "A specialist for host-related inquiries and account management.",
        "You specialize in helping hosts on Apprise Marketplace. Provide guidance on creating \
listings, managing bookings, optimizing profiles, handling guests, and setting up pricing.",
        model,
    );
    let technical = specialist(
        "Technical Support",
        "A specialist for technical issues and account troubleshooting.",
        "You specialize in technical support for Apprise Marketplace users. Help with login \
issues, app functionality, payment processing problems, and general troubleshooting.",
        model,
    );

    Agent::simple(
        "Apprise Assistant",
        prompt_with_handoff_instructions(
            "You are the primary voice assistant for Apprise Marketplace, a platform where users \
can host and book listings similar to Airbnb. Be friendly, helpful, and concise. \
When users ask specific questions about bookings, handoff to the Booking Specialist. \
When users need help with hosting or listing management, handoff to the Host Support agent. \
For technical issues or account problems, handoff to the Technical Support agent.",
        ),
    )
    .with_model(model)
    .with_handoffs(vec![
        Handoff::to(booking),
        Handoff::to(host),
        Handoff::to(technical),
    ])
    .with_tools(support_tools())
    .build()
}

fn devices(vad: &VadConfig) -> (Box<dyn AudioSource>, Box<dyn AudioSink>) {
    let microphone = PcmStreamSource::spawn(arecord_command(vad.sample_rate));
    let speaker = PcmStreamSink::spawn(aplay_command(vad.sample_rate));
    match (microphone, speaker) {
        (Ok(microphone), Ok(speaker)) => (Box::new(microphone), Box::new(speaker)),
        (Err(e), _) | (_, Err(e)) => {
            println!("Audio devices unavailable ({e}); using a scripted microphone.");
            (Box::new(scripted_microphone(vad)), Box::new(BufferSink::default()))
        }
    }
}

/// Two half-second tones at speaking level, each followed by quiet.
fn scripted_microphone(vad: &VadConfig) -> ScriptedSource {
    let utterance = generate_tone(vad.sample_rate, 220.0, 0.5, 0.3);
    let mut blocks = Vec::new();
    for _ in 0..2 {
        blocks.extend(utterance.chunks(vad.block_size).map(<[i16]>::to_vec));
        blocks.extend(std::iter::repeat(vec![0; vad.block_size]).take(60));
    }
    ScriptedSource::new(blocks)
}

fn report(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::NoSpeech => {
            println!("No speech detected. Please try again.");
            return;
        }
        TurnOutcome::Answered(turn) => {
            println!("You: {}", turn.transcript);
            println!("Assistant: {}", turn.reply);
        }
        TurnOutcome::Failed(e) => {
            println!("Error processing request: {e}");
            println!("Let's try again.");
        }
    }
    println!("\nReady for your next question...");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let vad = VadConfig::default();
    let voice = Arc::new(OpenAIVoice::new());
    let pipeline = VoicePipeline::new(assistant("gpt-4o-mini")?, voice.clone(), voice)
        .with_run_config(settings.run_config())
        .with_sample_rate(vad.sample_rate)
        .with_cue(generate_tone(vad.sample_rate, 880.0, 0.2, 0.5));

    println!("{}", "=".repeat(50));
    println!("Apprise Marketplace Voice Assistant");
    println!("{}", "=".repeat(50));
    println!("Speak after the tone. Press Ctrl+C to exit.");
    println!("Welcome to Apprise Marketplace customer support. How can I help you today?");

    let (mut microphone, mut speaker) = devices(&vad);
    tokio::select! {
        answered = pipeline.converse(microphone.as_mut(), speaker.as_mut(), &vad, report) => {
            println!("Microphone closed after {} answered questions.", answered?);
        }
        _ = tokio::signal::ctrl_c() => {}
    }
    println!("Thank you for using Apprise Marketplace Voice Assistant. Goodbye!");
    Ok(())
}
