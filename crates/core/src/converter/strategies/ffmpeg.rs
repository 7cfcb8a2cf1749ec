//! FFmpeg-backed strategies: video transcode, animated GIF, audio extraction
//! and audio transcode.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::ConversionStrategy;
use crate::converter::config::EngineConfig;
use crate::converter::error::ConverterError;
use crate::converter::progress::ProgressReporter;
use crate::converter::runner::ProcessRunner;
use crate::converter::types::{ConversionTask, ProcessInvocation, ProgressWindow};

/// Default animated image window in seconds.
const GIF_DEFAULT_DURATION: f64 = 10.0;
const GIF_DEFAULT_FPS: u32 = 15;
const GIF_DEFAULT_WIDTH: u32 = 480;

/// Returns the ffmpeg audio encoder for an output extension.
pub fn audio_codec_for(extension: &str) -> &'static str {
    match extension {
        "mp3" => "libmp3lame",
        "aac" | "m4a" => "aac",
        "wav" => "pcm_s16le",
        "flac" => "flac",
        "ogg" => "libvorbis",
        _ => "libmp3lame",
    }
}

fn is_lossless_codec(codec: &str) -> bool {
    matches!(codec, "pcm_s16le" | "flac")
}

/// Shared ffmpeg command-line layout.
#[derive(Debug, Clone)]
pub struct FfmpegArgs {
    program: PathBuf,
    log_level: String,
    extra_args: Vec<String>,
}

impl FfmpegArgs {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            log_level: config.ffmpeg_log_level.clone(),
            extra_args: config.extra_ffmpeg_args.clone(),
        }
    }

    /// Assembles `<common> <input options> -i <input> <output options> <extra> <output>`.
    fn invocation(
        &self,
        input_path: &Path,
        output_path: &Path,
        input_options: Vec<String>,
        output_options: Vec<String>,
    ) -> ProcessInvocation {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-y".to_string(), // Overwrite the pre-named output
            "-loglevel".to_string(),
            self.log_level.clone(),
            "-stats".to_string(),
        ];
        args.extend(input_options);
        args.extend(["-i".to_string(), input_path.to_string_lossy().to_string()]);
        args.extend(output_options);
        args.extend(self.extra_args.iter().cloned());
        args.push(output_path.to_string_lossy().to_string());

        ProcessInvocation::new(&self.program, args)
    }
}

/// Input-side trim arguments and the matching progress window.
fn trim_window(start: Option<f64>, length: Option<f64>) -> (Vec<String>, ProgressWindow) {
    let mut args = Vec::new();
    if let Some(start) = start {
        args.extend(["-ss".to_string(), start.to_string()]);
    }
    if let Some(length) = length {
        args.extend(["-t".to_string(), length.to_string()]);
    }
    let window = ProgressWindow {
        offset: start.unwrap_or(0.0),
        length,
    };
    (args, window)
}

async fn run_ffmpeg(
    runner: &ProcessRunner,
    invocation: ProcessInvocation,
    progress: &ProgressReporter,
) -> Result<(), ConverterError> {
    progress.report(15, "Starting transcoder");
    runner.run(&invocation, progress).await
}

/// Re-encodes video to H.264/AAC in a streamable container.
#[derive(Debug, Clone)]
pub struct VideoTranscode {
    ffmpeg: FfmpegArgs,
    runner: ProcessRunner,
}

impl VideoTranscode {
    pub fn new(ffmpeg: FfmpegArgs, runner: ProcessRunner) -> Self {
        Self { ffmpeg, runner }
    }

    pub fn build(&self, task: &ConversionTask<'_>) -> Result<ProcessInvocation, ConverterError> {
        let options = task.options;
        let quality = options.video_quality()?;
        let (input_options, window) =
            trim_window(options.start_offset()?, options.window_length()?);

        let mut output_options = vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "fast".to_string(),
            "-crf".to_string(),
            quality.crf().to_string(),
        ];
        if let Some((width, height)) = options.frame_size()? {
            output_options.extend(["-vf".to_string(), format!("scale={width}:{height}")]);
        }
        output_options.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);

        Ok(self
            .ffmpeg
            .invocation(task.input_path, task.output_path, input_options, output_options)
            .with_window(window))
    }
}

#[async_trait]
impl ConversionStrategy for VideoTranscode {
    fn name(&self) -> &str {
        "video-transcode"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        let invocation = self.build(task)?;
        run_ffmpeg(&self.runner, invocation, progress).await
    }
}

/// Cuts a window of video into an animated GIF.
#[derive(Debug, Clone)]
pub struct VideoToAnimatedImage {
    ffmpeg: FfmpegArgs,
    runner: ProcessRunner,
}

impl VideoToAnimatedImage {
    pub fn new(ffmpeg: FfmpegArgs, runner: ProcessRunner) -> Self {
        Self { ffmpeg, runner }
    }

    pub fn build(&self, task: &ConversionTask<'_>) -> Result<ProcessInvocation, ConverterError> {
        let options = task.options;
        let fps = options.fps.unwrap_or(GIF_DEFAULT_FPS);
        let width = options.width.unwrap_or(GIF_DEFAULT_WIDTH);
        if fps == 0 {
            return Err(ConverterError::invalid_option("fps", "must be positive"));
        }
        if width == 0 {
            return Err(ConverterError::invalid_option("width", "must be positive"));
        }

        let start = options.start_offset()?.unwrap_or(0.0);
        let length = options.window_length()?.unwrap_or(GIF_DEFAULT_DURATION);
        let (input_options, window) = trim_window(Some(start), Some(length));

        let output_options = vec![
            "-vf".to_string(),
            format!("fps={fps},scale={width}:-1:flags=lanczos"),
            "-loop".to_string(),
            "0".to_string(),
        ];

        Ok(self
            .ffmpeg
            .invocation(task.input_path, task.output_path, input_options, output_options)
            .with_window(window))
    }
}

#[async_trait]
impl ConversionStrategy for VideoToAnimatedImage {
    fn name(&self) -> &str {
        "video-to-gif"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        let invocation = self.build(task)?;
        run_ffmpeg(&self.runner, invocation, progress).await
    }
}

/// Strips video and encodes the audio track.
#[derive(Debug, Clone)]
pub struct AudioExtract {
    ffmpeg: FfmpegArgs,
    runner: ProcessRunner,
}

impl AudioExtract {
    pub fn new(ffmpeg: FfmpegArgs, runner: ProcessRunner) -> Self {
        Self { ffmpeg, runner }
    }

    pub fn build(&self, task: &ConversionTask<'_>) -> Result<ProcessInvocation, ConverterError> {
        let options = task.options;
        let codec = audio_codec_for(task.output_format);
        let (input_options, window) =
            trim_window(options.start_offset()?, options.window_length()?);

        let mut output_options = vec!["-vn".to_string(), "-c:a".to_string(), codec.to_string()];
        // Bitrate (for lossy codecs)
        if !is_lossless_codec(codec) {
            output_options.extend(["-b:a".to_string(), options.extract_bitrate()?]);
        }

        Ok(self
            .ffmpeg
            .invocation(task.input_path, task.output_path, input_options, output_options)
            .with_window(window))
    }
}

#[async_trait]
impl ConversionStrategy for AudioExtract {
    fn name(&self) -> &str {
        "audio-extract"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        let invocation = self.build(task)?;
        run_ffmpeg(&self.runner, invocation, progress).await
    }
}

/// Re-encodes audio to another codec.
#[derive(Debug, Clone)]
pub struct AudioTranscode {
    ffmpeg: FfmpegArgs,
    runner: ProcessRunner,
}

impl AudioTranscode {
    pub fn new(ffmpeg: FfmpegArgs, runner: ProcessRunner) -> Self {
        Self { ffmpeg, runner }
    }

    pub fn build(&self, task: &ConversionTask<'_>) -> Result<ProcessInvocation, ConverterError> {
        let options = task.options;
        let codec = audio_codec_for(task.output_format);

        let mut output_options = vec!["-vn".to_string(), "-c:a".to_string(), codec.to_string()];
        if !is_lossless_codec(codec) {
            output_options.extend(["-b:a".to_string(), options.audio_bitrate()?]);
        }
        output_options.extend(["-ar".to_string(), options.sample_rate().to_string()]);

        Ok(self
            .ffmpeg
            .invocation(task.input_path, task.output_path, Vec::new(), output_options))
    }
}

#[async_trait]
impl ConversionStrategy for AudioTranscode {
    fn name(&self) -> &str {
        "audio-transcode"
    }

    async fn execute(
        &self,
        task: &ConversionTask<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), ConverterError> {
        let invocation = self.build(task)?;
        run_ffmpeg(&self.runner, invocation, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::types::{ConversionOptions, QualityLevel, QualityOption};

    fn ffmpeg() -> FfmpegArgs {
        FfmpegArgs::from_config(&EngineConfig::default())
    }

    fn task<'a>(
        input: &'a str,
        output: &'a str,
        output_format: &'a str,
        options: &'a ConversionOptions,
    ) -> ConversionTask<'a> {
        ConversionTask {
            input_path: Path::new(input),
            output_path: Path::new(output),
            input_format: input.rsplit('.').next().unwrap_or_default(),
            output_format,
            options,
        }
    }

    #[test]
    fn test_audio_codec_lookup() {
        assert_eq!(audio_codec_for("mp3"), "libmp3lame");
        assert_eq!(audio_codec_for("aac"), "aac");
        assert_eq!(audio_codec_for("m4a"), "aac");
        assert_eq!(audio_codec_for("wav"), "pcm_s16le");
        assert_eq!(audio_codec_for("flac"), "flac");
        assert_eq!(audio_codec_for("ogg"), "libvorbis");
        assert_eq!(audio_codec_for("opus"), "libmp3lame");
    }

    #[test]
    fn test_common_layout() {
        let options = ConversionOptions::default();
        let strategy = AudioTranscode::new(ffmpeg(), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/song.flac", "/out/song.mp3", "mp3", &options))
            .unwrap();

        assert_eq!(invocation.program, PathBuf::from("ffmpeg"));
        assert_eq!(
            invocation.args[..5],
            ["-hide_banner", "-y", "-loglevel", "info", "-stats"]
        );
        assert!(invocation.has_arg_pair("-i", "/in/song.flac"));
        assert_eq!(invocation.args.last().unwrap(), "/out/song.mp3");
    }

    #[test]
    fn test_video_transcode_defaults() {
        let options = ConversionOptions::default();
        let strategy = VideoTranscode::new(ffmpeg(), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/clip.mkv", "/out/clip.mp4", "mp4", &options))
            .unwrap();

        assert!(invocation.has_arg_pair("-c:v", "libx264"));
        assert!(invocation.has_arg_pair("-c:a", "aac"));
        assert!(invocation.has_arg_pair("-preset", "fast"));
        assert!(invocation.has_arg_pair("-crf", "23"));
        assert!(invocation.has_arg_pair("-movflags", "+faststart"));
        assert!(!invocation.args.contains(&"-vf".to_string()));
        assert!(!invocation.args.contains(&"-ss".to_string()));
    }

    #[test]
    fn test_video_transcode_quality_and_resolution() {
        let options = ConversionOptions {
            quality: Some(QualityOption::Level(QualityLevel::High)),
            resolution: Some("1280x720".to_string()),
            ..Default::default()
        };
        let strategy = VideoTranscode::new(ffmpeg(), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/clip.mov", "/out/clip.mp4", "mp4", &options))
            .unwrap();

        assert!(invocation.has_arg_pair("-crf", "18"));
        assert!(invocation.has_arg_pair("-vf", "scale=1280:720"));

        let low = ConversionOptions {
            quality: Some(QualityOption::Level(QualityLevel::Low)),
            ..Default::default()
        };
        let invocation = strategy
            .build(&task("/in/clip.mov", "/out/clip.mp4", "mp4", &low))
            .unwrap();
        assert!(invocation.has_arg_pair("-crf", "28"));
    }

    #[test]
    fn test_video_transcode_rejects_bad_resolution() {
        let options = ConversionOptions {
            resolution: Some("hd".to_string()),
            ..Default::default()
        };
        let strategy = VideoTranscode::new(ffmpeg(), ProcessRunner::new(1));
        let result = strategy.build(&task("/in/clip.mov", "/out/clip.mp4", "mp4", &options));
        assert!(matches!(result, Err(ConverterError::InvalidOption { .. })));
    }

    #[test]
    fn test_gif_window_and_filter() {
        let options = ConversionOptions {
            fps: Some(10),
            width: Some(320),
            start_time: Some(2.0),
            duration: Some(5.0),
            ..Default::default()
        };
        let strategy = VideoToAnimatedImage::new(ffmpeg(), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/clip.mp4", "/out/clip.gif", "gif", &options))
            .unwrap();

        assert!(invocation.has_arg_pair("-ss", "2"));
        assert!(invocation.has_arg_pair("-t", "5"));
        assert!(invocation.has_arg_pair("-vf", "fps=10,scale=320:-1:flags=lanczos"));
        assert_eq!(invocation.window.offset, 2.0);
        assert_eq!(invocation.window.length, Some(5.0));

        // Trim options precede the input.
        let ss = invocation.args.iter().position(|a| a == "-ss").unwrap();
        let input = invocation.args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
    }

    #[test]
    fn test_gif_defaults() {
        let options = ConversionOptions::default();
        let strategy = VideoToAnimatedImage::new(ffmpeg(), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/clip.webm", "/out/clip.gif", "gif", &options))
            .unwrap();

        assert!(invocation.has_arg_pair("-ss", "0"));
        assert!(invocation.has_arg_pair("-t", "10"));
        assert!(invocation.has_arg_pair("-vf", "fps=15,scale=480:-1:flags=lanczos"));
    }

    #[test]
    fn test_gif_rejects_zero_fps() {
        let options = ConversionOptions {
            fps: Some(0),
            ..Default::default()
        };
        let strategy = VideoToAnimatedImage::new(ffmpeg(), ProcessRunner::new(1));
        assert!(strategy
            .build(&task("/in/clip.mp4", "/out/clip.gif", "gif", &options))
            .is_err());
    }

    #[test]
    fn test_audio_extract() {
        let options = ConversionOptions {
            quality: Some(QualityOption::Bitrate("256k".to_string())),
            start_time: Some(30.0),
            ..Default::default()
        };
        let strategy = AudioExtract::new(ffmpeg(), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/talk.mp4", "/out/talk.mp3", "mp3", &options))
            .unwrap();

        assert!(invocation.args.contains(&"-vn".to_string()));
        assert!(invocation.has_arg_pair("-c:a", "libmp3lame"));
        assert!(invocation.has_arg_pair("-b:a", "256k"));
        assert!(invocation.has_arg_pair("-ss", "30"));
        assert!(!invocation.args.contains(&"-t".to_string()));
    }

    #[test]
    fn test_audio_extract_lossless_skips_bitrate() {
        let options = ConversionOptions::default();
        let strategy = AudioExtract::new(ffmpeg(), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/talk.mp4", "/out/talk.flac", "flac", &options))
            .unwrap();

        assert!(invocation.has_arg_pair("-c:a", "flac"));
        assert!(!invocation.args.contains(&"-b:a".to_string()));
    }

    #[test]
    fn test_audio_transcode_defaults() {
        let options = ConversionOptions::default();
        let strategy = AudioTranscode::new(ffmpeg(), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/song.wav", "/out/song.ogg", "ogg", &options))
            .unwrap();

        assert!(invocation.has_arg_pair("-c:a", "libvorbis"));
        assert!(invocation.has_arg_pair("-b:a", "192k"));
        assert!(invocation.has_arg_pair("-ar", "44100"));
    }

    #[test]
    fn test_extra_args_before_output() {
        let config = EngineConfig {
            extra_ffmpeg_args: vec!["-threads".to_string(), "2".to_string()],
            ..Default::default()
        };
        let options = ConversionOptions::default();
        let strategy = AudioTranscode::new(FfmpegArgs::from_config(&config), ProcessRunner::new(1));
        let invocation = strategy
            .build(&task("/in/song.wav", "/out/song.mp3", "mp3", &options))
            .unwrap();

        let len = invocation.args.len();
        assert_eq!(invocation.args[len - 3], "-threads");
        assert_eq!(invocation.args[len - 2], "2");
    }
}
