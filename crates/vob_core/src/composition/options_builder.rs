//! Builds ffmpeg command tokens from a composition plan.
//!
//! The builder is a pure function of the plan and the encode settings; it
//! never touches the filesystem. Tokens do not include the program name.

use crate::config::EncodeSettings;

use super::plan_builder::{CompositionPlan, Placement, StageKind};

/// Video output label every plan must terminate in.
const VIDEO_OUT: &str = "vout";
/// Audio output label used when overlays are mixed in.
const AUDIO_OUT: &str = "aout";

/// Builds the ffmpeg argument list for one composition.
pub struct FfmpegOptionsBuilder<'a> {
    plan: &'a CompositionPlan,
    encode: &'a EncodeSettings,
}

impl<'a> FfmpegOptionsBuilder<'a> {
    pub fn new(plan: &'a CompositionPlan, encode: &'a EncodeSettings) -> Self {
        Self { plan, encode }
    }

    /// Build the full token list.
    pub fn build(&self) -> Vec<String> {
        let mut tokens = Vec::new();

        self.add_inputs(&mut tokens);
        self.add_filter_complex(&mut tokens);
        self.add_mappings(&mut tokens);
        self.add_encode_tail(&mut tokens);

        tokens
    }

    fn add_inputs(&self, tokens: &mut Vec<String>) {
        tokens.push("-threads".to_string());
        tokens.push("0".to_string());
        tokens.push("-i".to_string());
        tokens.push(self.plan.base_path.to_string_lossy().to_string());

        for placement in &self.plan.placements {
            tokens.push("-i".to_string());
            tokens.push(placement.clip.path.to_string_lossy().to_string());
        }
    }

    fn add_filter_complex(&self, tokens: &mut Vec<String>) {
        tokens.push("-filter_complex".to_string());
        tokens.push(self.filter_graph());
    }

    /// Assemble the filter graph.
    ///
    /// Each placement contributes a clip-preparation stage and an overlay
    /// stage; the overlay chain threads the base through `tmp` labels and
    /// the last stage writes the video output label. Audio is trimmed and
    /// delayed per overlay, then mixed against the base track.
    fn filter_graph(&self) -> String {
        if self.plan.is_identity() {
            return format!("[0:v]copy[{VIDEO_OUT}]");
        }

        let mut parts = Vec::new();
        let mut current = "0:v".to_string();
        let last_index = self.plan.placements.len() - 1;

        for (slot, placement) in self.plan.placements.iter().enumerate() {
            let dst = if slot == last_index {
                VIDEO_OUT.to_string()
            } else {
                format!("tmp{}", placement.input_index)
            };

            parts.push(clip_stage(placement));
            parts.push(overlay_stage(placement, &current, &dst));
            current = dst;
        }

        let mut mix_labels = vec!["[0:a]".to_string()];
        for placement in &self.plan.placements {
            parts.push(audio_stage(placement));
            mix_labels.push(format!("[a{}]", placement.input_index));
        }

        let weights = vec!["1"; mix_labels.len()].join(" ");
        parts.push(format!(
            "{}amix=inputs={}:duration=first:weights={}[{}]",
            mix_labels.concat(),
            mix_labels.len(),
            weights,
            AUDIO_OUT
        ));

        parts.join(";")
    }

    fn add_mappings(&self, tokens: &mut Vec<String>) {
        tokens.push("-map".to_string());
        tokens.push(format!("[{VIDEO_OUT}]"));
        tokens.push("-map".to_string());
        if self.plan.is_identity() {
            tokens.push("0:a".to_string());
        } else {
            tokens.push(format!("[{AUDIO_OUT}]"));
        }
    }

    /// Fixed encode parameters: 24 fps, 44.1 kHz stereo AAC, x264 with the
    /// configured preset and CRF, output cut to the base duration.
    fn add_encode_tail(&self, tokens: &mut Vec<String>) {
        tokens.push("-c:a".to_string());
        tokens.push("aac".to_string());
        tokens.push("-b:a".to_string());
        tokens.push(format!("{}k", self.encode.audio_bitrate_kbps));
        tokens.push("-ar".to_string());
        tokens.push("44100".to_string());
        tokens.push("-ac".to_string());
        tokens.push("2".to_string());
        tokens.push("-c:v".to_string());
        tokens.push("libx264".to_string());
        tokens.push("-preset".to_string());
        tokens.push(self.encode.preset.clone());
        tokens.push("-crf".to_string());
        tokens.push(self.encode.crf.to_string());
        tokens.push("-movflags".to_string());
        tokens.push("+faststart".to_string());
        tokens.push("-r".to_string());
        tokens.push("24".to_string());
        tokens.push("-threads".to_string());
        tokens.push("4".to_string());
        tokens.push("-avoid_negative_ts".to_string());
        tokens.push("make_zero".to_string());
        tokens.push("-fflags".to_string());
        tokens.push("+genpts".to_string());
        tokens.push("-t".to_string());
        tokens.push(format!("{}", self.plan.base_duration));
        tokens.push("-y".to_string());
        tokens.push(self.plan.output_path.to_string_lossy().to_string());
    }
}

/// Clip preparation filter for one placement.
fn clip_stage(placement: &Placement) -> String {
    let i = placement.input_index;
    let timing = &placement.timing;

    match placement.stage {
        StageKind::Shift => format!(
            "[{i}:v]trim=start={}:duration={},setpts=PTS-STARTPTS+{:.3}/TB[clip{i}]",
            timing.trim_start, timing.trim_duration, timing.start_offset
        ),
        StageKind::CapToBase { duration } => format!(
            "[{i}:v]trim=start={}:duration={},setpts=PTS-STARTPTS[clip{i}]",
            timing.trim_start, duration
        ),
        StageKind::GateWithTrim => format!(
            "[{i}:v]trim=start={}:duration={},setpts=PTS-STARTPTS[clip{i}]",
            timing.trim_start, timing.trim_duration
        ),
        StageKind::Gate => format!("[{i}:v]setpts=PTS-STARTPTS[clip{i}]"),
    }
}

/// Overlay filter for one placement.
///
/// Gated stages limit visibility to the clip's leading window; every stage
/// passes the base through after the overlay ends.
fn overlay_stage(placement: &Placement, src: &str, dst: &str) -> String {
    let i = placement.input_index;

    match placement.stage {
        StageKind::Gate | StageKind::GateWithTrim => format!(
            "[{src}][clip{i}]overlay=0:0:enable='between(t,0,{:.2})':eof_action=pass[{dst}]",
            placement.timing.trim_duration
        ),
        StageKind::Shift | StageKind::CapToBase { .. } => {
            format!("[{src}][clip{i}]overlay=0:0:eof_action=pass[{dst}]")
        }
    }
}

/// Audio trim, reset, and optional delay for one placement.
fn audio_stage(placement: &Placement) -> String {
    let i = placement.input_index;
    let timing = &placement.timing;

    let mut stage = format!(
        "[{i}:a]atrim=start={}:duration={},asetpts=PTS-STARTPTS",
        timing.trim_start, timing.trim_duration
    );
    if timing.start_offset > 0.0 {
        let delay_ms = (timing.start_offset * 1000.0).round() as i64;
        stage.push_str(&format!(",adelay={delay_ms}:all=1"));
    }
    stage.push_str(&format!("[a{i}]"));
    stage
}

/// Format tokens for log display, pairing options with their values.
pub fn format_tokens_pretty(tokens: &[String]) -> String {
    let mut result = String::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        if token.starts_with('-') && i + 1 < tokens.len() && !tokens[i + 1].starts_with('-') {
            result.push_str(&format!("{} {} \\\n", token, tokens[i + 1]));
            i += 2;
        } else {
            result.push_str(&format!("{} \\\n", token));
            i += 1;
        }
    }

    result.trim_end_matches(" \\\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::plan_builder::{CompositionPlan, Placement, StageKind};
    use crate::models::{OverlayClip, OverlayLayer};
    use crate::timing::TimingResult;
    use std::path::PathBuf;

    fn encode() -> EncodeSettings {
        EncodeSettings::default()
    }

    fn plan_with(placements: Vec<Placement>) -> CompositionPlan {
        CompositionPlan {
            base_path: PathBuf::from("/material/beach.mp4"),
            base_duration: 60.0,
            placements,
            output_path: PathBuf::from("/out/layered_beach_top.mp4"),
        }
    }

    fn placement(
        layer: OverlayLayer,
        input_index: usize,
        timing: TimingResult,
        stage: StageKind,
    ) -> Placement {
        Placement {
            layer,
            clip: OverlayClip::new(format!("/tpl/{layer}.mp4"), timing.trim_duration),
            timing,
            input_index,
            stage,
        }
    }

    fn timing(start_offset: f64, trim_start: f64, trim_duration: f64) -> TimingResult {
        TimingResult {
            start_offset,
            trim_start,
            trim_duration,
        }
    }

    fn filter_graph(tokens: &[String]) -> &str {
        let pos = tokens
            .iter()
            .position(|t| t == "-filter_complex")
            .expect("filter_complex present");
        &tokens[pos + 1]
    }

    fn has_pair(tokens: &[String], option: &str, value: &str) -> bool {
        tokens
            .windows(2)
            .any(|w| w[0] == option && w[1] == value)
    }

    #[test]
    fn identity_plan_passes_base_through() {
        let plan = plan_with(vec![]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();

        assert_eq!(filter_graph(&tokens), "[0:v]copy[vout]");
        assert!(has_pair(&tokens, "-map", "[vout]"));
        assert!(has_pair(&tokens, "-map", "0:a"));
        assert!(!tokens.iter().any(|t| t.contains("amix")));
    }

    #[test]
    fn inputs_start_with_base_then_overlays() {
        let plan = plan_with(vec![
            placement(
                OverlayLayer::Bottom,
                1,
                timing(0.0, 0.0, 18.0),
                StageKind::Gate,
            ),
            placement(
                OverlayLayer::Top,
                2,
                timing(0.0, 0.0, 12.0),
                StageKind::Gate,
            ),
        ]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();

        assert_eq!(tokens[0], "-threads");
        assert_eq!(tokens[1], "0");
        assert!(has_pair(&tokens, "-i", "/material/beach.mp4"));
        assert!(has_pair(&tokens, "-i", "/tpl/bottom.mp4"));
        assert!(has_pair(&tokens, "-i", "/tpl/top.mp4"));
    }

    #[test]
    fn shift_stage_moves_timestamps() {
        let plan = plan_with(vec![placement(
            OverlayLayer::Top,
            1,
            timing(42.0, 0.0, 18.0),
            StageKind::Shift,
        )]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();
        let graph = filter_graph(&tokens);

        assert!(graph.contains(
            "[1:v]trim=start=0:duration=18,setpts=PTS-STARTPTS+42.000/TB[clip1]"
        ));
        assert!(graph.contains("[0:v][clip1]overlay=0:0:eof_action=pass[vout]"));
        assert!(!graph.contains("enable="));
    }

    #[test]
    fn gate_stage_limits_visibility_window() {
        let plan = plan_with(vec![placement(
            OverlayLayer::Top,
            1,
            timing(0.0, 0.0, 18.0),
            StageKind::Gate,
        )]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();
        let graph = filter_graph(&tokens);

        assert!(graph.contains("[1:v]setpts=PTS-STARTPTS[clip1]"));
        assert!(!graph.contains("[1:v]trim"));
        assert!(graph.contains(
            "overlay=0:0:enable='between(t,0,18.00)':eof_action=pass[vout]"
        ));
    }

    #[test]
    fn gate_with_trim_keeps_trim_and_gates_to_it() {
        let plan = plan_with(vec![placement(
            OverlayLayer::Top,
            1,
            timing(0.0, 2.0, 5.0),
            StageKind::GateWithTrim,
        )]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();
        let graph = filter_graph(&tokens);

        assert!(graph.contains("[1:v]trim=start=2:duration=5,setpts=PTS-STARTPTS[clip1]"));
        assert!(graph.contains("enable='between(t,0,5.00)'"));
    }

    #[test]
    fn cap_to_base_trims_to_base_without_gating() {
        let plan = plan_with(vec![placement(
            OverlayLayer::Bottom,
            1,
            timing(0.0, 0.0, 90.0),
            StageKind::CapToBase { duration: 60.0 },
        )]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();
        let graph = filter_graph(&tokens);

        assert!(graph.contains("[1:v]trim=start=0:duration=60,setpts=PTS-STARTPTS[clip1]"));
        assert!(!graph.contains("enable="));
        // Audio keeps the clip's own window even when video caps to base.
        assert!(graph.contains("[1:a]atrim=start=0:duration=90,asetpts=PTS-STARTPTS[a1]"));
    }

    #[test]
    fn stacked_placements_chain_through_tmp_labels() {
        let plan = plan_with(vec![
            placement(
                OverlayLayer::Bottom,
                1,
                timing(0.0, 0.0, 18.0),
                StageKind::Gate,
            ),
            placement(
                OverlayLayer::Middle,
                2,
                timing(0.0, 0.0, 12.0),
                StageKind::Gate,
            ),
            placement(
                OverlayLayer::Top,
                3,
                timing(0.0, 0.0, 9.0),
                StageKind::Gate,
            ),
        ]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();
        let graph = filter_graph(&tokens);

        assert!(graph.contains("[0:v][clip1]overlay=0:0:enable='between(t,0,18.00)':eof_action=pass[tmp1]"));
        assert!(graph.contains("[tmp1][clip2]overlay=0:0:enable='between(t,0,12.00)':eof_action=pass[tmp2]"));
        assert!(graph.contains("[tmp2][clip3]overlay=0:0:enable='between(t,0,9.00)':eof_action=pass[vout]"));
    }

    #[test]
    fn delayed_audio_gets_adelay_in_milliseconds() {
        let plan = plan_with(vec![placement(
            OverlayLayer::Top,
            1,
            timing(42.125, 0.0, 18.0),
            StageKind::Shift,
        )]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();
        let graph = filter_graph(&tokens);

        assert!(graph.contains(
            "[1:a]atrim=start=0:duration=18,asetpts=PTS-STARTPTS,adelay=42125:all=1[a1]"
        ));
    }

    #[test]
    fn zero_offset_audio_has_no_delay() {
        let plan = plan_with(vec![placement(
            OverlayLayer::Top,
            1,
            timing(0.0, 0.0, 18.0),
            StageKind::Gate,
        )]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();
        let graph = filter_graph(&tokens);

        assert!(!graph.contains("adelay"));
        assert!(graph.contains("[0:a][a1]amix=inputs=2:duration=first:weights=1 1[aout]"));
    }

    #[test]
    fn mix_covers_base_and_every_overlay() {
        let plan = plan_with(vec![
            placement(
                OverlayLayer::Bottom,
                1,
                timing(0.0, 0.0, 18.0),
                StageKind::Gate,
            ),
            placement(
                OverlayLayer::Top,
                2,
                timing(0.0, 0.0, 12.0),
                StageKind::Gate,
            ),
        ]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();
        let graph = filter_graph(&tokens);

        assert!(graph.contains("[0:a][a1][a2]amix=inputs=3:duration=first:weights=1 1 1[aout]"));
        assert!(has_pair(&tokens, "-map", "[aout]"));
    }

    #[test]
    fn encode_tail_carries_fixed_parameters() {
        let plan = plan_with(vec![placement(
            OverlayLayer::Top,
            1,
            timing(0.0, 0.0, 18.0),
            StageKind::Gate,
        )]);
        let enc = encode();
        let tokens = FfmpegOptionsBuilder::new(&plan, &enc).build();

        assert!(has_pair(&tokens, "-c:a", "aac"));
        assert!(has_pair(&tokens, "-b:a", "192k"));
        assert!(has_pair(&tokens, "-ar", "44100"));
        assert!(has_pair(&tokens, "-ac", "2"));
        assert!(has_pair(&tokens, "-c:v", "libx264"));
        assert!(has_pair(&tokens, "-preset", "medium"));
        assert!(has_pair(&tokens, "-crf", "23"));
        assert!(has_pair(&tokens, "-movflags", "+faststart"));
        assert!(has_pair(&tokens, "-r", "24"));
        assert!(has_pair(&tokens, "-avoid_negative_ts", "make_zero"));
        assert!(has_pair(&tokens, "-fflags", "+genpts"));
        assert!(has_pair(&tokens, "-t", "60"));
        assert!(!tokens.iter().any(|t| t == "-shortest"));
        assert_eq!(tokens[tokens.len() - 2], "-y");
        assert_eq!(tokens.last().unwrap(), "/out/layered_beach_top.mp4");
    }

    #[test]
    fn pretty_format_pairs_options_with_values() {
        let tokens: Vec<String> = vec!["-threads", "0", "-i", "/material/beach.mp4", "-y"]
            .into_iter()
            .map(String::from)
            .collect();

        let pretty = format_tokens_pretty(&tokens);

        assert!(pretty.contains("-threads 0 \\\n"));
        assert!(pretty.contains("-i /material/beach.mp4"));
        assert!(!pretty.ends_with('\\'));
    }
}
