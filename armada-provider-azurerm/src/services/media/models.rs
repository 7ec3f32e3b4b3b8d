//! Media Services encoding models
//!
//! Presets, codecs, layers and formats are polymorphic on `@odata.type`.

use std::collections::BTreeMap;

use armada_core::odata_union;
use serde::{Deserialize, Serialize};

pub type ExperimentalOptions = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<TransformProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub outputs: Vec<TransformOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    /// `StopProcessingJob` or `ContinueJob`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_priority: Option<String>,
    pub preset: Preset,
}

// =============================================================================
// Presets
// =============================================================================

odata_union! {
    pub enum Preset = "@odata.type" {
        AudioAnalyzer(AudioAnalyzerPreset) = "#Microsoft.Media.AudioAnalyzerPreset",
        VideoAnalyzer(VideoAnalyzerPreset) = "#Microsoft.Media.VideoAnalyzerPreset",
        FaceDetector(FaceDetectorPreset) = "#Microsoft.Media.FaceDetectorPreset",
        BuiltInStandardEncoder(BuiltInStandardEncoderPreset) =
            "#Microsoft.Media.BuiltInStandardEncoderPreset",
        StandardEncoder(StandardEncoderPreset) = "#Microsoft.Media.StandardEncoderPreset",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnalyzerPreset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_language: Option<String>,
    /// `Basic` or `Standard`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_options: Option<ExperimentalOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalyzerPreset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights_to_extract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_options: Option<ExperimentalOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetectorPreset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_options: Option<ExperimentalOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltInStandardEncoderPreset {
    pub preset_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configurations: Option<PresetConfigurations>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetConfigurations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interleave_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_frame_interval_in_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bitrate_bps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_layers: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bitrate_bps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_height: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardEncoderPreset {
    #[serde(default)]
    pub codecs: Vec<Codec>,
    #[serde(default)]
    pub formats: Vec<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_options: Option<ExperimentalOptions>,
}

// =============================================================================
// Codecs
// =============================================================================

odata_union! {
    pub enum Codec = "@odata.type" {
        AacAudio(AacAudio) = "#Microsoft.Media.AacAudio",
        DdAudio(DdAudio) = "#Microsoft.Media.DDAudio",
        CopyAudio(CopyCodec) = "#Microsoft.Media.CopyAudio",
        CopyVideo(CopyCodec) = "#Microsoft.Media.CopyVideo",
        H264Video(H264Video) = "#Microsoft.Media.H264Video",
        H265Video(H265Video) = "#Microsoft.Media.H265Video",
        JpgImage(Image) = "#Microsoft.Media.JpgImage",
        PngImage(Image) = "#Microsoft.Media.PngImage",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AacAudio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DdAudio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_rate: Option<i64>,
}

/// Pass-through audio or video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyCodec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H264Video {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_frame_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_control_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_change_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stretch_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H265Video {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_frame_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_change_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stretch_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<Layer>,
}

/// Thumbnail generation, shared by the JPEG and PNG codecs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_frame_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stretch_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_mode: Option<String>,
    /// JPEG only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprite_column: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<Layer>,
}

// =============================================================================
// Layers
// =============================================================================

odata_union! {
    pub enum Layer = "@odata.type" {
        H264(VideoLayer) = "#Microsoft.Media.H264Layer",
        H265(VideoLayer) = "#Microsoft.Media.H265Layer",
        Jpg(ImageLayer) = "#Microsoft.Media.JpgLayer",
        Png(ImageLayer) = "#Microsoft.Media.PngLayer",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoLayer {
    pub bitrate: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_frames: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slices: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive_b_frame: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crf: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_frames: Option<i64>,
    /// H.264 only: `Cabac` or `Cavlc`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entropy_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// JPEG only, 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<i64>,
}

// =============================================================================
// Formats
// =============================================================================

odata_union! {
    pub enum Format = "@odata.type" {
        Mp4(MultiBitrateFormat) = "#Microsoft.Media.Mp4Format",
        TransportStream(MultiBitrateFormat) = "#Microsoft.Media.TransportStreamFormat",
        Jpg(ImageFormat) = "#Microsoft.Media.JpgFormat",
        Png(ImageFormat) = "#Microsoft.Media.PngFormat",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiBitrateFormat {
    pub filename_pattern: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_files: Vec<OutputFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFormat {
    pub filename_pattern: String,
}
