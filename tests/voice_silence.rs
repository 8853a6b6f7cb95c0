//! Silence detection over scripted audio.

use apprise_agents::voice::{record_until_silence, ScriptedSource, VadConfig};
use proptest::prelude::*;

fn run(source: &mut ScriptedSource, config: &VadConfig) -> apprise_agents::voice::Recording {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(record_until_silence(source, config))
        .unwrap()
}

proptest! {
    // N loud blocks then enough silence: capture ends after exactly
    // N + required_silent_frames + buffer_frames reads.
    #[test]
    fn stops_exactly_after_silence_and_buffer(
        loud in 1usize..120,
        extra_quiet in 0usize..40,
        level in 501i16..i16::MAX,
    ) {
        let config = VadConfig::default();
        let required = config.required_silent_frames();
        let buffer = config.buffer_frames();
        let mut source = ScriptedSource::speech_then_silence(
            loud,
            required + buffer + extra_quiet,
            config.block_size,
            level,
        );

        let rec = run(&mut source, &config);
        prop_assert!(rec.speech_detected);
        prop_assert_eq!(rec.blocks_read, loud + required + buffer);
        prop_assert_eq!(source.reads(), loud + required + buffer);
        prop_assert_eq!(rec.samples.len(), (loud + required + buffer) * config.block_size);
    }

    // Quiet input never starts a recording.
    #[test]
    fn quiet_input_yields_one_silent_block(level in 0i16..=500, blocks in 1usize..80) {
        let config = VadConfig::default();
        let mut source = ScriptedSource::speech_then_silence(blocks, 0, config.block_size, level);
        let rec = run(&mut source, &config);
        prop_assert!(!rec.speech_detected);
        prop_assert_eq!(rec.blocks_read, blocks);
        prop_assert_eq!(rec.samples, vec![0i16; config.block_size]);
    }
}
