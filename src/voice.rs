//! Voice turn handling: record until the speaker goes quiet, run the
//! transcript through an agent, and stream the spoken reply to a sink.
//!
//! Audio devices stay behind [`AudioSource`] and [`AudioSink`]; speech
//! recognition and synthesis behind [`SpeechToText`] and [`TextToSpeech`].
//! Samples are mono signed 16-bit PCM throughout. The device itself is an
//! external process: [`PcmStreamSource`] and [`PcmStreamSink`] speak raw
//! little-endian PCM over a byte stream, e.g. `arecord` and `aplay`.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    AudioInput, CreateSpeechRequestArgs, CreateTranscriptionRequestArgs, SpeechModel,
    SpeechResponseFormat, Voice,
};
use async_openai::Client;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::agent::Agent;
use crate::error::{AgentsError, Result};
use crate::result::RunResult;
use crate::runner::{RunConfig, Runner};

pub type Sample = i16;

/// Voice activity detection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VadConfig {
    pub sample_rate: u32,
    /// Samples per block read from the source.
    pub block_size: usize,
    /// Mean absolute amplitude separating speech from silence.
    pub silence_threshold: f64,
    /// Seconds of continuous silence that end a recording.
    pub silence_duration: f64,
    /// Seconds recorded after the silence is detected.
    pub buffer_duration: f64,
    /// Upper bound on reads for one recording.
    pub max_blocks: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            block_size: 1024,
            silence_threshold: 500.0,
            silence_duration: 1.5,
            buffer_duration: 0.5,
            // about a minute at the defaults
            max_blocks: 1_406,
        }
    }
}

impl VadConfig {
    /// Silent blocks in a row that end the recording (35 by default).
    pub fn required_silent_frames(&self) -> usize {
        (self.silence_duration * self.sample_rate as f64 / self.block_size as f64) as usize
    }

    /// Blocks read after silence is detected (11 by default).
    pub fn buffer_frames(&self) -> usize {
        (self.buffer_duration * self.sample_rate as f64 / self.block_size as f64) as usize
    }
}

/// Microphone-like input.
#[async_trait]
pub trait AudioSource: Send {
    /// Next block of up to `frames` samples; `None` once the input is closed.
    async fn read_block(&mut self, frames: usize) -> Result<Option<Vec<Sample>>>;
}

/// Speaker-like output.
#[async_trait]
pub trait AudioSink: Send {
    async fn write(&mut self, samples: &[Sample]) -> Result<()>;
}

/// Captured audio from one call to [`record_until_silence`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub samples: Vec<Sample>,
    /// Reads made from the source, including the trailing buffer.
    pub blocks_read: usize,
    pub speech_detected: bool,
}

impl Recording {
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }
}

/// Mean absolute amplitude of a block.
pub fn mean_volume(block: &[Sample]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let total: f64 = block.iter().map(|s| (*s as i32).abs() as f64).sum();
    total / block.len() as f64
}

/// Wait for speech, then record until `required_silent_frames` quiet blocks
/// in a row, plus `buffer_frames` more.
///
/// A block starts the recording when louder than the threshold and counts as
/// silent when quieter than it; a block exactly at the threshold resets the
/// silence counter. When nothing was captured the recording is one block of
/// zeros with `speech_detected == false`.
pub async fn record_until_silence<S>(source: &mut S, config: &VadConfig) -> Result<Recording>
where
    S: AudioSource + ?Sized,
{
    let required = config.required_silent_frames();
    let buffer = config.buffer_frames();
    let mut chunks: Vec<Vec<Sample>> = Vec::new();
    let mut recording = false;
    let mut silent_frames = 0usize;
    let mut reads = 0usize;

    'outer: while reads < config.max_blocks {
        let Some(block) = source.read_block(config.block_size).await? else {
            break;
        };
        reads += 1;
        let volume = mean_volume(&block);

        if !recording && volume > config.silence_threshold {
            recording = true;
            tracing::debug!(volume, "speech detected");
        }
        if !recording {
            continue;
        }

        chunks.push(block);
        if volume < config.silence_threshold {
            silent_frames += 1;
            if silent_frames >= required {
                for _ in 0..buffer {
                    if reads >= config.max_blocks {
                        break 'outer;
                    }
                    match source.read_block(config.block_size).await? {
                        Some(tail) => {
                            reads += 1;
                            chunks.push(tail);
                        }
                        None => break 'outer,
                    }
                }
                break;
            }
        } else {
            silent_frames = 0;
        }
    }

    if chunks.is_empty() {
        tracing::debug!(reads, "no speech detected");
        return Ok(Recording {
            samples: vec![0; config.block_size],
            blocks_read: reads,
            speech_detected: false,
        });
    }

    let samples: Vec<Sample> = chunks.concat();
    tracing::debug!(
        reads,
        seconds = samples.len() as f64 / config.sample_rate as f64,
        "recording stopped"
    );
    Ok(Recording {
        samples,
        blocks_read: reads,
        speech_detected: true,
    })
}

/// A sine cue, e.g. `generate_tone(24_000, 880.0, 0.2, 0.5)` for "speak now".
pub fn generate_tone(sample_rate: u32, frequency: f64, duration: f64, volume: f64) -> Vec<Sample> {
    let len = (sample_rate as f64 * duration) as usize;
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin() * volume;
            (value * i16::MAX as f64) as Sample
        })
        .collect()
}

/// Little-endian 16-bit mono WAV.
pub fn encode_wav(samples: &[Sample], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, samples: &[Sample], sample_rate: u32) -> Result<String>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesized audio as a sequence of chunks, played in order.
    async fn synthesize(&self, text: &str) -> Result<Vec<Vec<Sample>>>;
}

/// Transcription and speech through the OpenAI audio endpoints. Speech comes
/// back as raw 24 kHz PCM.
#[derive(Debug, Clone)]
pub struct OpenAIVoice {
    client: Client<OpenAIConfig>,
    transcription_model: String,
    voice: Voice,
    chunk_samples: usize,
}

impl OpenAIVoice {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client<OpenAIConfig>) -> Self {
        Self {
            client,
            transcription_model: "whisper-1".to_string(),
            voice: Voice::Alloy,
            chunk_samples: 4096,
        }
    }

    pub fn with_transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }
}

impl Default for OpenAIVoice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechToText for OpenAIVoice {
    async fn transcribe(&self, samples: &[Sample], sample_rate: u32) -> Result<String> {
        let wav = encode_wav(samples, sample_rate);
        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8("input.wav".to_string(), wav))
            .model(self.transcription_model.clone())
            .build()?;
        let response = self.client.audio().transcribe(request).await?;
        Ok(response.text)
    }
}

#[async_trait]
impl TextToSpeech for OpenAIVoice {
    async fn synthesize(&self, text: &str) -> Result<Vec<Vec<Sample>>> {
        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .model(SpeechModel::Tts1)
            .voice(self.voice.clone())
            .response_format(SpeechResponseFormat::Pcm)
            .build()?;
        let response = self.client.audio().speech(request).await?;
        let samples: Vec<Sample> = response
            .bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(samples
            .chunks(self.chunk_samples.max(1))
            .map(<[Sample]>::to_vec)
            .collect())
    }
}

/// Outcome of one voice turn.
#[derive(Debug, Clone)]
pub struct VoiceTurn {
    pub transcript: String,
    pub reply: String,
    pub result: RunResult,
}

/// Speech in, agent run, speech out.
#[derive(Clone)]
pub struct VoicePipeline {
    agent: Agent,
    run_config: RunConfig,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    sample_rate: u32,
    cue: Option<Vec<Sample>>,
}

/// What one pass of [`VoicePipeline::converse`] produced.
#[derive(Debug)]
pub enum TurnOutcome {
    Answered(VoiceTurn),
    NoSpeech,
    /// The turn failed after speech was captured; the conversation goes on.
    Failed(AgentsError),
}

impl std::fmt::Debug for VoicePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePipeline")
            .field("agent", &self.agent.name())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl VoicePipeline {
    pub fn new(agent: Agent, stt: Arc<dyn SpeechToText>, tts: Arc<dyn TextToSpeech>) -> Self {
        Self {
            agent,
            run_config: RunConfig::default(),
            stt,
            tts,
            sample_rate: VadConfig::default().sample_rate,
            cue: None,
        }
    }

    /// Audio written to the sink before each listen.
    pub fn with_cue(mut self, cue: Vec<Sample>) -> Self {
        self.cue = Some(cue);
        self
    }

    pub fn with_run_config(mut self, config: RunConfig) -> Self {
        self.run_config = config;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub async fn run(&self, recording: &Recording, sink: &mut dyn AudioSink) -> Result<VoiceTurn> {
        if !recording.speech_detected {
            return Err(AgentsError::Other("no speech detected".to_string()));
        }
        let transcript = self
            .stt
            .transcribe(&recording.samples, self.sample_rate)
            .await?;
        tracing::info!(transcript = %transcript, "voice turn transcribed");

        let result = Runner::run(self.agent.clone(), transcript.clone(), self.run_config.clone()).await?;
        let reply = result.final_text();

        for chunk in self.tts.synthesize(&reply).await? {
            sink.write(&chunk).await?;
        }
        Ok(VoiceTurn {
            transcript,
            reply,
            result,
        })
    }

    /// Listen and answer until the source closes.
    ///
    /// Silence and failed turns are reported to `on_turn` and the loop
    /// listens again. Only a failing source or cue write ends the
    /// conversation early. Returns the number of answered turns.
    pub async fn converse<F>(
        &self,
        source: &mut dyn AudioSource,
        sink: &mut dyn AudioSink,
        vad: &VadConfig,
        mut on_turn: F,
    ) -> Result<usize>
    where
        F: FnMut(&TurnOutcome),
    {
        let mut answered = 0usize;
        loop {
            if let Some(cue) = &self.cue {
                sink.write(cue).await?;
            }
            let recording = record_until_silence(&mut *source, vad).await?;
            if recording.blocks_read == 0 {
                tracing::info!(answered, "audio input closed");
                return Ok(answered);
            }

            let outcome = if !recording.speech_detected {
                TurnOutcome::NoSpeech
            } else {
                match self.run(&recording, &mut *sink).await {
                    Ok(turn) => {
                        answered += 1;
                        TurnOutcome::Answered(turn)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "voice turn failed");
                        TurnOutcome::Failed(e)
                    }
                }
            };
            on_turn(&outcome);
        }
    }
}

/// Raw signed 16-bit little-endian PCM read from a byte stream.
#[derive(Debug)]
pub struct PcmStreamSource<R> {
    reader: R,
    // Keeps a spawned recorder alive; it is killed on drop.
    _child: Option<Child>,
}

impl<R> PcmStreamSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            _child: None,
        }
    }
}

impl PcmStreamSource<ChildStdout> {
    /// Run `command` as the microphone, reading PCM from its stdout.
    pub fn spawn(mut command: Command) -> Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentsError::Other("recorder stdout is not piped".to_string()))?;
        Ok(Self {
            reader: stdout,
            _child: Some(child),
        })
    }
}

#[async_trait]
impl<R> AudioSource for PcmStreamSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_block(&mut self, frames: usize) -> Result<Option<Vec<Sample>>> {
        let mut bytes = vec![0u8; frames * 2];
        let mut filled = 0;
        while filled < bytes.len() {
            let n = self.reader.read(&mut bytes[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < 2 {
            return Ok(None);
        }
        // a trailing odd byte is dropped
        Ok(Some(
            bytes[..filled]
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        ))
    }
}

/// Writes samples as raw signed 16-bit little-endian PCM.
#[derive(Debug)]
pub struct PcmStreamSink<W> {
    writer: W,
    _child: Option<Child>,
}

impl<W> PcmStreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            _child: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl PcmStreamSink<ChildStdin> {
    /// Run `command` as the speaker, writing PCM to its stdin.
    pub fn spawn(mut command: Command) -> Result<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .kill_on_drop(true);
        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentsError::Other("player stdin is not piped".to_string()))?;
        Ok(Self {
            writer: stdin,
            _child: Some(child),
        })
    }
}

#[async_trait]
impl<W> AudioSink for PcmStreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, samples: &[Sample]) -> Result<()> {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// `arecord` capturing mono raw PCM at `sample_rate`.
pub fn arecord_command(sample_rate: u32) -> Command {
    let mut cmd = Command::new("arecord");
    cmd.args(["-q", "-t", "raw", "-f", "S16_LE", "-c", "1", "-r"])
        .arg(sample_rate.to_string());
    cmd
}

/// `aplay` playing mono raw PCM at `sample_rate`.
pub fn aplay_command(sample_rate: u32) -> Command {
    let mut cmd = Command::new("aplay");
    cmd.args(["-q", "-t", "raw", "-f", "S16_LE", "-c", "1", "-r"])
        .arg(sample_rate.to_string());
    cmd
}

/// Plays back a fixed list of blocks, then reports the input closed.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    blocks: VecDeque<Vec<Sample>>,
    reads: usize,
}

impl ScriptedSource {
    pub fn new(blocks: impl IntoIterator<Item = Vec<Sample>>) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
            reads: 0,
        }
    }

    /// `loud` blocks at amplitude `level` followed by `quiet` blocks of zeros.
    pub fn speech_then_silence(loud: usize, quiet: usize, block_size: usize, level: Sample) -> Self {
        let loud_blocks = std::iter::repeat(vec![level; block_size]).take(loud);
        let quiet_blocks = std::iter::repeat(vec![0; block_size]).take(quiet);
        Self::new(loud_blocks.chain(quiet_blocks))
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl AudioSource for ScriptedSource {
    async fn read_block(&mut self, _frames: usize) -> Result<Option<Vec<Sample>>> {
        let block = self.blocks.pop_front();
        if block.is_some() {
            self.reads += 1;
        }
        Ok(block)
    }
}

/// Collects everything written to it.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    pub samples: Vec<Sample>,
    pub writes: usize,
}

#[async_trait]
impl AudioSink for BufferSink {
    async fn write(&mut self, samples: &[Sample]) -> Result<()> {
        self.samples.extend_from_slice(samples);
        self.writes += 1;
        Ok(())
    }
}
