//! Compiles a [`RenderJob`] into one ffmpeg invocation.
//!
//! Inputs are laid out as every clip in playback order, followed by one input
//! per background loop copy. The graph draws captions on each clip, fits it
//! into the common canvas, concatenates the clips, builds the background
//! track (concat, trim, volume, fades) and mixes it with the clips' audio.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::audio::{AudioMix, BackgroundTrack};
use crate::config::CaptionStyle;
use crate::error::{ConfigError, Result};
use crate::media::RenderJob;
use crate::video::{AnchorCoord, ComposedClip, FontFace, ResolvedOverlay};

/// Sample rate and layout every audio branch is normalized to before concat
const AUDIO_RATE: u32 = 48_000;
const AUDIO_FORMAT: &str = "aformat=sample_fmts=fltp:channel_layouts=stereo";

const VIDEO_OUT: &str = "vout";
const TIMELINE_AUDIO: &str = "tla";
const BACKGROUND_AUDIO: &str = "bgm";
const MIXED_AUDIO: &str = "aout";

/// A compiled render, ready to hand to ffmpeg
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    /// Input files, in `-i` order
    pub inputs: Vec<PathBuf>,
    pub filter_graph: String,
    /// Mapping and codec arguments placed before the output path
    pub output_args: Vec<String>,
}

/// Compile a job into a render plan
pub fn compile(job: &RenderJob<'_>) -> Result<RenderPlan> {
    let timeline = job.timeline;
    if timeline.clips().is_empty() {
        return Err(ConfigError::NoVideos.into());
    }

    let mut inputs: Vec<PathBuf> = timeline.clips().iter().map(|c| c.source.path.clone()).collect();
    let mut chains = Vec::new();

    let mix = timeline.audio();
    let clip_audio = mix.map(AudioMix::includes_timeline).unwrap_or(false);

    let (width, height) = timeline.canvas();
    let fps = fmt_decimal(timeline.frame_rate());

    let mut concat_inputs = String::new();
    for (i, clip) in timeline.clips().iter().enumerate() {
        // Caption windows are clip-local, so timestamps restart at zero first
        chains.push(format!(
            "[{i}:v]setpts=PTS-STARTPTS,{captions}scale=w='min(iw,{width})':h='min(ih,{height})':force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps},format=yuv420p[v{i}]",
            captions = caption_filters(clip, job.caption_style),
        ));
        let _ = write!(concat_inputs, "[v{i}]");

        if clip_audio {
            chains.push(clip_audio_chain(i, clip));
            let _ = write!(concat_inputs, "[a{i}]");
        }
    }

    let clip_count = timeline.clips().len();
    if clip_audio {
        chains.push(format!(
            "{concat_inputs}concat=n={clip_count}:v=1:a=1[{VIDEO_OUT}][{TIMELINE_AUDIO}]"
        ));
    } else {
        chains.push(format!("{concat_inputs}concat=n={clip_count}:v=1:a=0[{VIDEO_OUT}]"));
    }

    let mut audio_out = None;
    if let Some(mix) = mix {
        if let Some(track) = mix.background() {
            let first_input = inputs.len();
            inputs.extend(track.copies.iter().map(|copy| copy.path.clone()));
            chains.extend(background_chains(track, first_input));
        }

        audio_out = Some(match (mix.includes_timeline(), mix.background().is_some()) {
            (true, true) => {
                chains.push(format!(
                    "[{TIMELINE_AUDIO}][{BACKGROUND_AUDIO}]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[{MIXED_AUDIO}]"
                ));
                MIXED_AUDIO
            }
            (false, true) => BACKGROUND_AUDIO,
            _ => TIMELINE_AUDIO,
        });
    }

    let mut output_args = vec!["-map".to_string(), format!("[{VIDEO_OUT}]")];
    match audio_out {
        Some(label) => output_args.extend([
            "-map".to_string(),
            format!("[{label}]"),
            "-c:a".to_string(),
            job.audio_codec().to_string(),
        ]),
        None => output_args.push("-an".to_string()),
    }

    let encoding = job.encoding;
    output_args.extend([
        "-c:v".to_string(),
        encoding.codec.ffmpeg_name().to_string(),
        "-b:v".to_string(),
        encoding.bitrate.to_string(),
    ]);
    if encoding.codec.supports_preset() {
        output_args.extend(["-preset".to_string(), encoding.preset.as_str().to_string()]);
    }
    output_args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);

    Ok(RenderPlan {
        inputs,
        filter_graph: chains.join(";"),
        output_args,
    })
}

/// Full ffmpeg argument list for writing `plan` to `output`
pub fn build_ffmpeg_args(plan: &RenderPlan, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for input in &plan.inputs {
        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(plan.filter_graph.clone());
    args.extend(plan.output_args.iter().cloned());
    args.push(output.to_string_lossy().to_string());

    args
}

/// Drawtext filters for every caption of a clip, each followed by a comma
fn caption_filters(clip: &ComposedClip, style: &CaptionStyle) -> String {
    clip.captions
        .iter()
        .map(|caption| format!("{},", drawtext(caption, style)))
        .collect()
}

fn drawtext(caption: &ResolvedOverlay, style: &CaptionStyle) -> String {
    let mut filter = String::from("drawtext=");

    match &caption.font.face {
        FontFace::File(path) => {
            let _ = write!(filter, "fontfile={}:", escape_filter_value(&path.to_string_lossy()));
        }
        FontFace::Family(family) => {
            let _ = write!(filter, "font={}:", escape_filter_value(family));
        }
    }

    let _ = write!(
        filter,
        "text={}:expansion=none:fontsize={}:fontcolor={}",
        escape_filter_value(&caption.text),
        caption.font.size,
        escape_filter_value(&style.text_color),
    );

    if let Some(box_color) = &style.box_color {
        let _ = write!(
            filter,
            ":box=1:boxcolor={}:boxborderw={}",
            escape_filter_value(box_color),
            style.box_padding
        );
    }
    if let Some(border_color) = &style.border_color {
        if style.border_width > 0 {
            let _ = write!(
                filter,
                ":bordercolor={}:borderw={}",
                escape_filter_value(border_color),
                style.border_width
            );
        }
    }

    let anchor = caption.position.anchor();
    let _ = write!(
        filter,
        ":x={}:y={}:enable='gte(t,{})*lt(t,{})'",
        anchor_expr(anchor.x, "w", "text_w"),
        anchor_expr(anchor.y, "h", "text_h"),
        fmt_decimal(caption.window.start),
        fmt_decimal(caption.window.end()),
    );

    filter
}

fn anchor_expr(coord: AnchorCoord, frame: &str, text: &str) -> String {
    match coord {
        AnchorCoord::Fraction(f) => format!("{frame}*{}", fmt_decimal(f)),
        AnchorCoord::Start => "0".to_string(),
        AnchorCoord::Center => format!("({frame}-{text})/2"),
        AnchorCoord::End => format!("{frame}-{text}"),
    }
}

/// Native audio padded or cut to the clip length, or silence for muted clips
fn clip_audio_chain(index: usize, clip: &ComposedClip) -> String {
    let duration = fmt_decimal(clip.duration());
    if clip.audio {
        format!(
            "[{index}:a]aresample={AUDIO_RATE},{AUDIO_FORMAT},apad,atrim=duration={duration},asetpts=PTS-STARTPTS[a{index}]"
        )
    } else {
        format!("anullsrc=r={AUDIO_RATE}:cl=stereo,atrim=duration={duration},{AUDIO_FORMAT}[a{index}]")
    }
}

/// Loop copies joined end to end, trimmed to the track, then gain and fades
fn background_chains(track: &BackgroundTrack, first_input: usize) -> Vec<String> {
    let mut chains: Vec<String> = (0..track.copies.len())
        .map(|j| format!("[{}:a]aresample={AUDIO_RATE},{AUDIO_FORMAT}[b{j}]", first_input + j))
        .collect();

    let mut chain: String = (0..track.copies.len()).map(|j| format!("[b{j}]")).collect();
    let _ = write!(
        chain,
        "concat=n={}:v=0:a=1,atrim=start=0:end={},asetpts=PTS-STARTPTS",
        track.copies.len(),
        fmt_decimal(track.duration)
    );

    if let Some(gain) = track.gain {
        let _ = write!(chain, ",volume={}", fmt_decimal(gain));
    }
    if let Some(fade_in) = track.fade_in {
        let _ = write!(chain, ",afade=t=in:st=0:d={}", fmt_decimal(fade_in));
    }
    if let (Some(fade_out), Some(start)) = (track.fade_out, track.fade_out_start()) {
        let _ = write!(
            chain,
            ",afade=t=out:st={}:d={}",
            fmt_decimal(start),
            fmt_decimal(fade_out)
        );
    }
    let _ = write!(chain, "[{BACKGROUND_AUDIO}]");

    chains.push(chain);
    chains
}

/// Escape a value for use as a filter option inside a filter graph.
///
/// The option parser gives `\ ' :` special meaning; the graph parser then
/// gives `\ ' [ ] , ;` special meaning, so both layers are escaped in turn.
pub fn escape_filter_value(value: &str) -> String {
    let option = escape_chars(value, &['\\', '\'', ':']);
    escape_chars(&option, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Seconds with at most millisecond precision and no trailing zeros
pub fn fmt_decimal(value: f64) -> String {
    let formatted = format!("{:.3}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{mix, BackgroundTrack};
    use crate::config::{EncodingSettings, Position, VideoCodec};
    use crate::media::{MediaHandle, MediaInfo};
    use crate::video::{OverlayWindow, ResolvedFont, Timeline};

    fn handle(id: u64, path: &str, info: MediaInfo) -> MediaHandle {
        MediaHandle {
            id,
            path: PathBuf::from(path),
            info,
        }
    }

    fn clip(id: u64, duration: f64, audio: bool, captions: Vec<ResolvedOverlay>) -> ComposedClip {
        ComposedClip {
            source: handle(id, &format!("clip{}.mp4", id), MediaInfo::video(duration, (1280, 720), 30.0, true)),
            audio,
            captions,
        }
    }

    fn caption(text: &str, start: f64, duration: f64, position: Position) -> ResolvedOverlay {
        ResolvedOverlay {
            text: text.to_string(),
            window: OverlayWindow::new(start, duration),
            position,
            font: ResolvedFont {
                face: FontFace::Family("DejaVu Sans".to_string()),
                size: 24,
            },
        }
    }

    fn background(copies: usize, source: f64, duration: f64) -> BackgroundTrack {
        BackgroundTrack {
            source_path: PathBuf::from("bgm.mp3"),
            source_duration: source,
            copies: (0..copies)
                .map(|j| handle(100 + j as u64, "bgm.mp3", MediaInfo::audio(source)))
                .collect(),
            duration,
            gain: Some(0.5),
            fade_in: Some(1.0),
            fade_out: Some(1.0),
        }
    }

    fn plan_for(timeline: &Timeline, encoding: &EncodingSettings) -> RenderPlan {
        let style = CaptionStyle::default();
        compile(&RenderJob {
            timeline,
            encoding,
            caption_style: &style,
        })
        .unwrap()
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("plain"), "plain");
        assert_eq!(escape_filter_value("a:b"), "a\\\\:b");
        assert_eq!(escape_filter_value("it's"), "it\\\\\\'s");
        assert_eq!(escape_filter_value("[x],y;"), "\\[x\\]\\,y\\;");
    }

    #[test]
    fn test_fmt_decimal() {
        assert_eq!(fmt_decimal(5.0), "5");
        assert_eq!(fmt_decimal(0.5), "0.5");
        assert_eq!(fmt_decimal(19.0004), "19");
        assert_eq!(fmt_decimal(29.97002997), "29.97");
        assert_eq!(fmt_decimal(0.0), "0");
    }

    #[test]
    fn test_single_silent_clip_without_captions() {
        let timeline = Timeline::concat(vec![clip(0, 5.0, false, Vec::new())]).unwrap();
        let plan = plan_for(&timeline, &EncodingSettings::default());

        assert_eq!(plan.inputs, vec![PathBuf::from("clip0.mp4")]);
        assert!(!plan.filter_graph.contains("drawtext"));
        assert!(plan.filter_graph.starts_with("[0:v]setpts=PTS-STARTPTS,scale="));
        assert!(plan.filter_graph.contains("concat=n=1:v=1:a=0[vout]"));
        assert!(plan.output_args.contains(&"-an".to_string()));
        assert!(plan.output_args.contains(&"-preset".to_string()));
    }

    #[test]
    fn test_captions_are_drawn_in_their_window() {
        let captions = vec![
            caption("Hello", 0.0, 3.0, Position::LeftBottom),
            caption("Top", 1.0, 2.0, Position::RightTop),
        ];
        let mut timeline = Timeline::concat(vec![clip(0, 5.0, true, captions)]).unwrap();
        let audio = mix(&timeline, None);
        timeline.attach_audio(audio);
        let plan = plan_for(&timeline, &EncodingSettings::default());

        assert!(plan.filter_graph.contains("text=Hello:expansion=none:fontsize=24:fontcolor=black"));
        assert!(plan.filter_graph.contains(":box=1:boxcolor=white:boxborderw=10"));
        assert!(plan.filter_graph.contains("x=w*0.025:y=h*0.9:enable='gte(t,0)*lt(t,3)'"));
        assert!(plan.filter_graph.contains("x=w-text_w:y=0:enable='gte(t,1)*lt(t,3)'"));
        assert!(plan.filter_graph.contains("font=DejaVu Sans:"));
    }

    #[test]
    fn test_timestamps_restart_before_captions() {
        let captions = vec![caption("Hi", 0.0, 2.0, Position::Center)];
        let timeline = Timeline::concat(vec![
            clip(0, 5.0, false, Vec::new()),
            clip(1, 5.0, false, captions),
        ])
        .unwrap();
        let plan = plan_for(&timeline, &EncodingSettings::default());

        assert!(plan.filter_graph.contains("[0:v]setpts=PTS-STARTPTS,scale="));
        assert!(plan.filter_graph.contains("[1:v]setpts=PTS-STARTPTS,drawtext="));
        assert!(plan.filter_graph.contains("enable='gte(t,0)*lt(t,2)'"));
    }

    #[test]
    fn test_plain_caption_style_has_no_box() {
        let captions = vec![caption("a:b, c", 0.0, 1.0, Position::Center)];
        let timeline = Timeline::concat(vec![clip(0, 5.0, false, captions)]).unwrap();
        let encoding = EncodingSettings::default();
        let style = CaptionStyle::plain("yellow");
        let plan = compile(&RenderJob {
            timeline: &timeline,
            encoding: &encoding,
            caption_style: &style,
        })
        .unwrap();

        assert!(plan.filter_graph.contains("text=a\\\\:b\\, c:"));
        assert!(plan.filter_graph.contains("fontcolor=yellow:x=(w-text_w)/2:y=(h-text_h)/2"));
        assert!(!plan.filter_graph.contains("box=1"));
    }

    #[test]
    fn test_muted_clip_contributes_silence() {
        let mut timeline = Timeline::concat(vec![
            clip(0, 5.0, true, Vec::new()),
            clip(1, 10.0, false, Vec::new()),
        ])
        .unwrap();
        let audio = mix(&timeline, None);
        timeline.attach_audio(audio);
        let plan = plan_for(&timeline, &EncodingSettings::default());

        assert!(plan.filter_graph.contains("[0:a]aresample=48000"));
        assert!(!plan.filter_graph.contains("[1:a]"));
        assert!(plan.filter_graph.contains("anullsrc=r=48000:cl=stereo,atrim=duration=10"));
        assert!(plan.filter_graph.contains("[v0][a0][v1][a1]concat=n=2:v=1:a=1[vout][tla]"));

        let map = plan.output_args.iter().position(|a| a == "[tla]");
        assert!(map.is_some(), "single source should be mapped as is");
        assert!(!plan.filter_graph.contains("amix"));
    }

    #[test]
    fn test_background_is_looped_trimmed_and_mixed() {
        let mut timeline = Timeline::concat(vec![
            clip(0, 5.0, true, Vec::new()),
            clip(1, 10.0, true, Vec::new()),
            clip(2, 5.0, true, Vec::new()),
        ])
        .unwrap();
        let audio = mix(&timeline, Some(background(4, 6.0, 20.0)));
        timeline.attach_audio(audio);
        let plan = plan_for(&timeline, &EncodingSettings::default());

        assert_eq!(plan.inputs.len(), 7);
        assert!(plan.filter_graph.contains("[6:a]aresample=48000"));
        assert!(plan.filter_graph.contains(
            "[b0][b1][b2][b3]concat=n=4:v=0:a=1,atrim=start=0:end=20,asetpts=PTS-STARTPTS,\
             volume=0.5,afade=t=in:st=0:d=1,afade=t=out:st=19:d=1[bgm]"
        ));
        assert!(plan
            .filter_graph
            .contains("[tla][bgm]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]"));
        assert!(plan.output_args.contains(&"[aout]".to_string()));
        assert!(plan.output_args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_background_only_passes_through() {
        let mut timeline = Timeline::concat(vec![clip(0, 5.0, false, Vec::new())]).unwrap();
        let audio = mix(&timeline, Some(background(1, 8.0, 5.0)));
        timeline.attach_audio(audio);
        let plan = plan_for(&timeline, &EncodingSettings::default());

        assert!(plan.filter_graph.contains("concat=n=1:v=1:a=0[vout]"));
        assert!(plan.output_args.contains(&"[bgm]".to_string()));
        assert!(!plan.filter_graph.contains("amix"));
    }

    #[test]
    fn test_codec_without_preset_support() {
        let timeline = Timeline::concat(vec![clip(0, 5.0, false, Vec::new())]).unwrap();
        let encoding = EncodingSettings {
            codec: VideoCodec::LibvpxVp9,
            ..EncodingSettings::default()
        };
        let plan = plan_for(&timeline, &encoding);

        assert!(plan.output_args.contains(&"libvpx-vp9".to_string()));
        assert!(!plan.output_args.contains(&"-preset".to_string()));
    }

    #[test]
    fn test_ffmpeg_args_order() {
        let plan = RenderPlan {
            inputs: vec![PathBuf::from("a.mp4")],
            filter_graph: "[0:v]null[vout]".to_string(),
            output_args: vec!["-map".to_string(), "[vout]".to_string()],
        };
        let args = build_ffmpeg_args(&plan, Path::new("out.mp4"));

        assert_eq!(&args[..5], &["-hide_banner", "-loglevel", "error", "-nostdin", "-y"]);
        assert_eq!(&args[5..7], &["-i", "a.mp4"]);
        assert_eq!(args[7], "-filter_complex");
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }
}
