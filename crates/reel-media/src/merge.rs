//! Concatenation of generated clips into one video.
//!
//! Clips are ordered by scene id, scaled onto the surface of the first usable
//! clip, resampled to a constant frame rate and re-encoded as a single stream.
//! Audio is dropped. The output only appears at its final path once FFmpeg has
//! finished successfully.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use reel_models::encoding::MERGE_FPS;
use reel_models::{EncodingConfig, GeneratedClip, SceneId};

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// A probed clip that will be part of the merged output.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSegment {
    pub scene_id: SceneId,
    pub path: PathBuf,
    pub info: VideoInfo,
}

/// Ordered segments and the surface they are drawn onto.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    segments: Vec<MergeSegment>,
    skipped: Vec<SceneId>,
    width: u32,
    height: u32,
}

impl MergePlan {
    /// Plan a merge from probe results.
    ///
    /// Clips whose probe failed are skipped; the rest are ordered by scene id.
    /// The surface is the first usable clip's size, rounded down to even
    /// dimensions.
    pub fn build(probed: Vec<(GeneratedClip, MediaResult<VideoInfo>)>) -> MediaResult<Self> {
        let mut probed = probed;
        probed.sort_by_key(|(clip, _)| clip.scene_id);

        let mut segments = Vec::with_capacity(probed.len());
        let mut skipped = Vec::new();

        for (clip, info) in probed {
            match info {
                Ok(info) if info.width >= 2 && info.height >= 2 => segments.push(MergeSegment {
                    scene_id: clip.scene_id,
                    path: clip.path,
                    info,
                }),
                Ok(info) => {
                    warn!(
                        scene_id = %clip.scene_id,
                        "Skipping clip with unusable size {}x{}",
                        info.width,
                        info.height
                    );
                    skipped.push(clip.scene_id);
                }
                Err(e) => {
                    warn!(scene_id = %clip.scene_id, path = %clip.path.display(), "Skipping undecodable clip: {}", e);
                    skipped.push(clip.scene_id);
                }
            }
        }

        let first = segments.first().ok_or(MediaError::NothingToMerge)?;
        let width = first.info.width & !1;
        let height = first.info.height & !1;

        Ok(Self {
            segments,
            skipped,
            width,
            height,
        })
    }

    pub fn segments(&self) -> &[MergeSegment] {
        &self.segments
    }

    /// Scenes left out because their clip could not be used.
    pub fn skipped(&self) -> &[SceneId] {
        &self.skipped
    }

    pub fn scene_order(&self) -> Vec<SceneId> {
        self.segments.iter().map(|s| s.scene_id).collect()
    }

    /// Output surface as (width, height).
    pub fn surface(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Sum of segment durations in milliseconds.
    pub fn total_duration_ms(&self) -> i64 {
        let secs: f64 = self.segments.iter().map(|s| s.info.duration).sum();
        (secs * 1000.0) as i64
    }

    /// Filter graph normalizing every input and concatenating into `[outv]`.
    pub fn filter_graph(&self, fps: u32, pixel_format: &str) -> String {
        let mut graph = String::new();

        for i in 0..self.segments.len() {
            graph.push_str(&format!(
                "[{i}:v]scale={w}:{h},setsar=1,fps={fps},format={pix}[v{i}];",
                i = i,
                w = self.width,
                h = self.height,
                fps = fps,
                pix = pixel_format
            ));
        }

        for i in 0..self.segments.len() {
            graph.push_str(&format!("[v{}]", i));
        }
        graph.push_str(&format!("concat=n={}:v=1:a=0[outv]", self.segments.len()));

        graph
    }

    /// FFmpeg invocation writing the plan to `output`.
    pub fn command(&self, output: impl AsRef<Path>, encoding: &EncodingConfig) -> FfmpegCommand {
        FfmpegCommand::new(output)
            .inputs(self.segments.iter().map(|s| &s.path))
            .filter_complex(self.filter_graph(MERGE_FPS, &encoding.pixel_format))
            .map("[outv]")
            .encoding(encoding)
            .frame_rate(MERGE_FPS)
            .no_audio()
            .output_arg("-movflags")
            .output_arg("+faststart")
    }
}

/// Result of a finished merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub path: PathBuf,
    pub scenes: Vec<SceneId>,
    pub skipped: Vec<SceneId>,
    pub width: u32,
    pub height: u32,
}

/// Merges clips with FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    encoding: EncodingConfig,
    runner: FfmpegRunner,
}

impl MergeEngine {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            runner: FfmpegRunner::new(),
        }
    }

    /// Kill FFmpeg if it runs longer than `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.runner.timeout_secs()
    }

    /// Probe every clip and plan the merge.
    pub async fn plan(&self, clips: &[GeneratedClip]) -> MediaResult<MergePlan> {
        let mut probed = Vec::with_capacity(clips.len());
        for clip in clips {
            let info = probe_video(&clip.path).await;
            probed.push((clip.clone(), info));
        }
        MergePlan::build(probed)
    }

    /// Merge `clips` into `output`.
    pub async fn merge(
        &self,
        clips: &[GeneratedClip],
        output: impl AsRef<Path>,
    ) -> MediaResult<MergeOutcome> {
        self.merge_with_progress(clips, output, |_| {}).await
    }

    /// Merge `clips` into `output`, reporting percent complete.
    pub async fn merge_with_progress<F>(
        &self,
        clips: &[GeneratedClip],
        output: impl AsRef<Path>,
        on_progress: F,
    ) -> MediaResult<MergeOutcome>
    where
        F: Fn(f64) + Send + 'static,
    {
        let output = output.as_ref();
        check_ffmpeg()?;

        let plan = self.plan(clips).await?;
        let (width, height) = plan.surface();
        info!(
            segments = plan.segments().len(),
            skipped = plan.skipped().len(),
            width,
            height,
            "Merging clips"
        );

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = temp_path(output);
        let total_ms = plan.total_duration_ms();
        let cmd = plan.command(&temp, &self.encoding);

        let result = self
            .runner
            .run_with_progress(&cmd, move |p| on_progress(p.percentage(total_ms)))
            .await;

        let result = match result {
            Ok(()) => tokio::fs::rename(&temp, output)
                .await
                .map_err(MediaError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            remove_partial(&temp).await;
            return Err(MediaError::merge_from(e));
        }

        info!(path = %output.display(), "Merged video written");
        Ok(MergeOutcome {
            path: output.to_path_buf(),
            scenes: plan.scene_order(),
            skipped: plan.skipped().to_vec(),
            width,
            height,
        })
    }
}

/// Hidden sibling of `output` that keeps its extension.
fn temp_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "merged.mp4".to_string());
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| reel_models::encoding::MERGE_EXTENSION.to_string());
    output.with_file_name(format!(".{}.{}.partial.{}", name, Uuid::new_v4().simple(), ext))
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove partial output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32) -> VideoInfo {
        VideoInfo {
            duration: 8.0,
            width,
            height,
            fps: 24.0,
            codec: "h264".to_string(),
            size: 1024,
        }
    }

    fn clip(id: u32) -> GeneratedClip {
        GeneratedClip::new(SceneId(id), format!("/clips/{}.mp4", id), 1024)
    }

    #[test]
    fn test_plan_orders_by_scene_id() {
        let plan = MergePlan::build(vec![
            (clip(3), Ok(info(1280, 720))),
            (clip(1), Ok(info(1280, 720))),
            (clip(2), Ok(info(1280, 720))),
        ])
        .unwrap();

        assert_eq!(plan.scene_order(), vec![SceneId(1), SceneId(2), SceneId(3)]);
        assert_eq!(plan.segments()[0].path, PathBuf::from("/clips/1.mp4"));
    }

    #[test]
    fn test_plan_with_gaps_has_only_existing_clips() {
        let plan = MergePlan::build(vec![
            (clip(3), Ok(info(1280, 720))),
            (clip(1), Ok(info(1280, 720))),
        ])
        .unwrap();

        assert_eq!(plan.segments().len(), 2);
        assert_eq!(plan.scene_order(), vec![SceneId(1), SceneId(3)]);
        assert!(plan.skipped().is_empty());
    }

    #[test]
    fn test_undecodable_clip_is_skipped() {
        let plan = MergePlan::build(vec![
            (clip(1), Err(MediaError::InvalidVideo("No video stream found".to_string()))),
            (clip(2), Ok(info(720, 1280))),
            (clip(3), Ok(info(1280, 720))),
        ])
        .unwrap();

        assert_eq!(plan.scene_order(), vec![SceneId(2), SceneId(3)]);
        assert_eq!(plan.skipped(), &[SceneId(1)]);
        assert_eq!(plan.surface(), (720, 1280));
    }

    #[test]
    fn test_surface_rounded_to_even() {
        let plan = MergePlan::build(vec![(clip(1), Ok(info(1281, 719)))]).unwrap();
        assert_eq!(plan.surface(), (1280, 718));
    }

    #[test]
    fn test_nothing_usable_is_nothing_to_merge() {
        assert!(matches!(MergePlan::build(vec![]), Err(MediaError::NothingToMerge)));
        assert!(matches!(
            MergePlan::build(vec![(clip(1), Err(MediaError::FileNotFound("/x".into())))]),
            Err(MediaError::NothingToMerge)
        ));
    }

    #[test]
    fn test_filter_graph() {
        let plan = MergePlan::build(vec![
            (clip(2), Ok(info(1280, 720))),
            (clip(1), Ok(info(640, 360))),
        ])
        .unwrap();

        assert_eq!(
            plan.filter_graph(30, "yuv420p"),
            "[0:v]scale=640:360,setsar=1,fps=30,format=yuv420p[v0];\
             [1:v]scale=640:360,setsar=1,fps=30,format=yuv420p[v1];\
             [v0][v1]concat=n=2:v=1:a=0[outv]"
        );
    }

    #[test]
    fn test_filter_format_follows_encoding() {
        let plan = MergePlan::build(vec![(clip(1), Ok(info(1280, 720)))]).unwrap();
        let encoding = EncodingConfig::default().with_pixel_format("yuv444p");
        let args = plan.command("out.mp4", &encoding).build_args();

        let graph = args
            .iter()
            .skip_while(|a| *a != "-filter_complex")
            .nth(1)
            .unwrap();
        assert!(graph.contains("format=yuv444p[v0]"));
        assert!(!graph.contains("yuv420p"));

        let pix_fmt = args.iter().skip_while(|a| *a != "-pix_fmt").nth(1).unwrap();
        assert_eq!(pix_fmt, "yuv444p");
    }

    #[test]
    fn test_command_inputs_follow_plan_order() {
        let plan = MergePlan::build(vec![
            (clip(2), Ok(info(1280, 720))),
            (clip(1), Ok(info(1280, 720))),
        ])
        .unwrap();
        let args = plan.command("out.mp4", &EncodingConfig::default()).build_args();

        let inputs: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "-i")
            .map(|(_, path)| path)
            .collect();
        assert_eq!(inputs, vec!["/clips/1.mp4", "/clips/2.mp4"]);
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path(Path::new("/out/city_at_dawn_merged.mp4"));
        assert_eq!(temp.parent(), Some(Path::new("/out")));
        assert_eq!(temp.extension().and_then(|e| e.to_str()), Some("mp4"));
        assert!(temp
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(".city_at_dawn_merged.mp4.")));
    }
}
