//! Media Services transforms
//!
//! A transform is a list of outputs, each produced by exactly one preset. The
//! custom preset nests codec and format blocks which again hold exactly one
//! type each; the block name selects the `@odata.type` sent to the service.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info};

use armada_core::provider::{ProviderError, ProviderResult, ResourceHandler};
use armada_core::resource::{Attributes, Resource, ResourceAddress, State, Value, blocks};
use armada_core::resource_id::{ResourceIdError, ResourceIdentifier};
use armada_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, Timeouts, types};

use super::models::{
    AacAudio, AudioAnalyzerPreset, BuiltInStandardEncoderPreset, Codec, CopyCodec, DdAudio,
    ExperimentalOptions, FaceDetectorPreset, Format, H264Video, H265Video, Image, ImageFormat,
    ImageLayer, Layer, MultiBitrateFormat, OutputFile, Preset, PresetConfigurations,
    StandardEncoderPreset, Transform, TransformOutput, TransformProperties, VideoAnalyzerPreset,
    VideoLayer,
};
use crate::context::ProviderContext;
use crate::ids::TransformId;
use crate::services::{arm_error, check_requires_import, gone};
use crate::utils::{
    block_bool, block_float, block_int, block_str, expand_string_list, expand_string_map,
    flatten_string_list, set, single_block,
};

const PRESETS: &[&str] = &[
    "builtin_preset",
    "custom_preset",
    "face_detector_preset",
    "video_analyzer_preset",
    "audio_analyzer_preset",
];
const CODECS: &[&str] = &[
    "aac_audio",
    "copy_audio",
    "copy_video",
    "dd_audio",
    "h264_video",
    "h265_video",
    "jpg_image",
    "png_image",
];
const FORMATS: &[&str] = &["jpg", "mp4", "png", "transport_stream"];

const BUILTIN_PRESETS: &[&str] = &[
    "AACGoodQualityAudio",
    "AdaptiveStreaming",
    "ContentAwareEncoding",
    "ContentAwareEncodingExperimental",
    "CopyAllBitrateNonInterleaved",
    "DDGoodQualityAudio",
    "H265AdaptiveStreaming",
    "H265ContentAwareEncoding",
    "H265SingleBitrate4K",
    "H265SingleBitrate1080p",
    "H265SingleBitrate720p",
    "H264MultipleBitrate1080p",
    "H264MultipleBitrateSD",
    "H264MultipleBitrate720p",
    "H264SingleBitrate1080p",
    "H264SingleBitrateSD",
    "H264SingleBitrate720p",
];
const STRETCH_MODES: &[&str] = &["AutoFit", "AutoSize", "None"];
const SYNC_MODES: &[&str] = &["Auto", "Cfr", "Passthrough", "Vfr"];

pub struct TransformResource;

// =============================================================================
// Schema
// =============================================================================

fn experimental_options() -> AttributeSchema {
    AttributeSchema::new(
        "experimental_options",
        AttributeType::Map(Box::new(AttributeType::String)),
    )
}

fn label() -> AttributeSchema {
    AttributeSchema::new("label", types::non_empty_string())
}

fn builtin_preset_block() -> AttributeType {
    let configuration = BlockSchema::new()
        .attribute(AttributeSchema::new(
            "complexity",
            types::one_of(&["Balanced", "Quality", "Speed"]),
        ))
        .attribute(AttributeSchema::new(
            "interleave_output",
            types::one_of(&["InterleavedOutput", "NonInterleavedOutput"]),
        ))
        .attribute(AttributeSchema::new("key_frame_interval_in_seconds", AttributeType::Float))
        .attribute(AttributeSchema::new("max_bitrate_bps", types::positive_int()))
        .attribute(AttributeSchema::new("max_height", types::positive_int()))
        .attribute(AttributeSchema::new("max_layers", types::positive_int()))
        .attribute(AttributeSchema::new("min_bitrate_bps", types::positive_int()))
        .attribute(AttributeSchema::new("min_height", types::positive_int()))
        .max_items(1);

    BlockSchema::new()
        .attribute(AttributeSchema::new("preset_name", types::one_of(BUILTIN_PRESETS)).required())
        .attribute(AttributeSchema::new("preset_configuration", configuration.into_type()))
        .max_items(1)
        .into_type()
}

fn analyzer_preset_block(video: bool) -> AttributeType {
    let block = BlockSchema::new()
        .attribute(AttributeSchema::new("audio_language", types::non_empty_string()))
        .attribute(
            AttributeSchema::new("audio_analysis_mode", types::one_of(&["Basic", "Standard"]))
                .with_default("Standard"),
        )
        .attribute(experimental_options())
        .max_items(1);
    let block = if video {
        block.attribute(
            AttributeSchema::new(
                "insights_type",
                types::one_of(&["AllInsights", "AudioInsightsOnly", "VideoInsightsOnly"]),
            )
            .with_default("AllInsights"),
        )
    } else {
        block
    };
    block.into_type()
}

fn face_detector_preset_block() -> AttributeType {
    BlockSchema::new()
        .attribute(
            AttributeSchema::new(
                "analysis_resolution",
                types::one_of(&["SourceResolution", "StandardDefinition"]),
            )
            .with_default("SourceResolution"),
        )
        .attribute(AttributeSchema::new(
            "blur_type",
            types::one_of(&["Black", "Box", "High", "Low", "Med"]),
        ))
        .attribute(
            AttributeSchema::new(
                "face_redactor_mode",
                types::one_of(&["Analyze", "Combined", "Redact"]),
            )
            .with_default("Analyze"),
        )
        .attribute(experimental_options())
        .max_items(1)
        .into_type()
}

fn audio_codec_block(dolby: bool) -> AttributeType {
    let block = BlockSchema::new()
        .attribute(label())
        .attribute(
            AttributeSchema::new("bitrate", types::positive_int())
                .with_default(if dolby { 192_000i64 } else { 128_000i64 }),
        )
        .attribute(AttributeSchema::new("channels", types::positive_int()).with_default(2i64))
        .attribute(AttributeSchema::new("sampling_rate", types::positive_int()).with_default(48_000i64))
        .max_items(1);
    let block = if dolby {
        block
    } else {
        block.attribute(
            AttributeSchema::new("profile", types::one_of(&["AacLc", "HeAacV1", "HeAacV2"]))
                .with_default("AacLc"),
        )
    };
    block.into_type()
}

fn copy_codec_block() -> AttributeType {
    BlockSchema::new().attribute(label()).max_items(1).into_type()
}

fn video_layer_block(h264: bool) -> AttributeType {
    let block = BlockSchema::new()
        .attribute(AttributeSchema::new("bitrate", types::positive_int()).required())
        .attribute(AttributeSchema::new("adaptive_b_frame_enabled", AttributeType::Bool).with_default(true))
        .attribute(AttributeSchema::new("b_frames", types::int_at_least(0)))
        .attribute(AttributeSchema::new("buffer_window", types::non_empty_string()).with_default("PT5S"))
        .attribute(
            AttributeSchema::new("crf", AttributeType::Float)
                .with_default(if h264 { 23.0 } else { 28.0 }),
        )
        .attribute(AttributeSchema::new("frame_rate", types::non_empty_string()))
        .attribute(AttributeSchema::new("height", types::non_empty_string()))
        .attribute(label())
        .attribute(AttributeSchema::new("level", types::non_empty_string()).with_default("auto"))
        .attribute(AttributeSchema::new("max_bitrate", types::positive_int()))
        .attribute(AttributeSchema::new("reference_frames", types::positive_int()))
        .attribute(AttributeSchema::new("slices", types::int_at_least(0)))
        .attribute(AttributeSchema::new("width", types::non_empty_string()));
    let block = if h264 {
        block
            .attribute(AttributeSchema::new("entropy_mode", types::one_of(&["Cabac", "Cavlc"])))
            .attribute(
                AttributeSchema::new(
                    "profile",
                    types::one_of(&["Auto", "Baseline", "High", "High422", "High444", "Main"]),
                )
                .with_default("Auto"),
            )
    } else {
        block.attribute(
            AttributeSchema::new("profile", types::one_of(&["Auto", "Main", "Main10"]))
                .with_default("Auto"),
        )
    };
    block.into_type()
}

fn video_codec_block(h264: bool) -> AttributeType {
    let block = BlockSchema::new()
        .attribute(
            AttributeSchema::new("complexity", types::one_of(&["Balanced", "Quality", "Speed"]))
                .with_default("Balanced"),
        )
        .attribute(AttributeSchema::new("key_frame_interval", types::non_empty_string()).with_default("PT2S"))
        .attribute(label())
        .attribute(AttributeSchema::new("layer", video_layer_block(h264)))
        .attribute(
            AttributeSchema::new("scene_change_detection_enabled", AttributeType::Bool)
                .with_default(false),
        )
        .attribute(AttributeSchema::new("stretch_mode", types::one_of(STRETCH_MODES)).with_default("AutoSize"))
        .attribute(AttributeSchema::new("sync_mode", types::one_of(SYNC_MODES)).with_default("Auto"))
        .max_items(1);
    let block = if h264 {
        block.attribute(
            AttributeSchema::new("rate_control_mode", types::one_of(&["ABR", "CBR", "CRF"]))
                .with_default("ABR"),
        )
    } else {
        block
    };
    block.into_type()
}

fn image_codec_block(jpg: bool) -> AttributeType {
    let layer = BlockSchema::new()
        .attribute(AttributeSchema::new("height", types::non_empty_string()))
        .attribute(label())
        .attribute(AttributeSchema::new("width", types::non_empty_string()));
    let layer = if jpg {
        layer.attribute(AttributeSchema::new("quality", types::int_between(0, 100)).with_default(70i64))
    } else {
        layer
    };

    let block = BlockSchema::new()
        .attribute(AttributeSchema::new("start", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("key_frame_interval", types::non_empty_string()).with_default("PT2S"))
        .attribute(label())
        .attribute(AttributeSchema::new("layer", layer.into_type()))
        .attribute(AttributeSchema::new("range", types::non_empty_string()).with_default("100%"))
        .attribute(AttributeSchema::new("step", types::non_empty_string()))
        .attribute(AttributeSchema::new("stretch_mode", types::one_of(STRETCH_MODES)).with_default("AutoSize"))
        .attribute(AttributeSchema::new("sync_mode", types::one_of(SYNC_MODES)).with_default("Auto"))
        .max_items(1);
    let block = if jpg {
        block.attribute(AttributeSchema::new("sprite_column", types::int_at_least(0)).with_default(0i64))
    } else {
        block
    };
    block.into_type()
}

fn format_block(multi_bitrate: bool) -> AttributeType {
    let block = BlockSchema::new()
        .attribute(AttributeSchema::new("filename_pattern", types::non_empty_string()).required())
        .max_items(1);
    let block = if multi_bitrate {
        block.attribute(AttributeSchema::new(
            "output_file",
            BlockSchema::new()
                .attribute(
                    AttributeSchema::new(
                        "labels",
                        AttributeType::List(Box::new(types::non_empty_string())),
                    )
                    .required(),
                )
                .into_type(),
        ))
    } else {
        block
    };
    block.into_type()
}

fn custom_preset_block() -> AttributeType {
    let codec = BlockSchema::new()
        .attribute(AttributeSchema::new("aac_audio", audio_codec_block(false)))
        .attribute(AttributeSchema::new("copy_audio", copy_codec_block()))
        .attribute(AttributeSchema::new("copy_video", copy_codec_block()))
        .attribute(AttributeSchema::new("dd_audio", audio_codec_block(true)))
        .attribute(AttributeSchema::new("h264_video", video_codec_block(true)))
        .attribute(AttributeSchema::new("h265_video", video_codec_block(false)))
        .attribute(AttributeSchema::new("jpg_image", image_codec_block(true)))
        .attribute(AttributeSchema::new("png_image", image_codec_block(false)))
        .min_items(1);
    let format = BlockSchema::new()
        .attribute(AttributeSchema::new("jpg", format_block(false)))
        .attribute(AttributeSchema::new("mp4", format_block(true)))
        .attribute(AttributeSchema::new("png", format_block(false)))
        .attribute(AttributeSchema::new("transport_stream", format_block(true)))
        .min_items(1);

    BlockSchema::new()
        .attribute(AttributeSchema::new("codec", codec.into_type()).required())
        .attribute(AttributeSchema::new("format", format.into_type()).required())
        .attribute(experimental_options())
        .max_items(1)
        .into_type()
}

fn output_block() -> AttributeType {
    BlockSchema::new()
        .attribute(
            AttributeSchema::new(
                "on_error_action",
                types::one_of(&["ContinueJob", "StopProcessingJob"]),
            )
            .with_default("StopProcessingJob"),
        )
        .attribute(
            AttributeSchema::new("relative_priority", types::one_of(&["High", "Low", "Normal"]))
                .with_default("Normal"),
        )
        .attribute(AttributeSchema::new("builtin_preset", builtin_preset_block()))
        .attribute(AttributeSchema::new("audio_analyzer_preset", analyzer_preset_block(false)))
        .attribute(AttributeSchema::new("video_analyzer_preset", analyzer_preset_block(true)))
        .attribute(AttributeSchema::new("face_detector_preset", face_detector_preset_block()))
        .attribute(AttributeSchema::new("custom_preset", custom_preset_block()))
        .min_items(1)
        .into_type()
}

// =============================================================================
// Expand
// =============================================================================

type Block = HashMap<String, Value>;

fn text(block: &Block, key: &str) -> Option<String> {
    block_str(block, key).map(str::to_string)
}

fn expand_options(block: &Block) -> Option<ExperimentalOptions> {
    block
        .get("experimental_options")
        .map(|value| expand_string_map(Some(value)).into_iter().collect())
}

fn one_of_names(names: &[&str]) -> String {
    match names.split_last() {
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
        None => String::new(),
    }
}

/// The single nested block set among `kinds`
fn exactly_one<'a>(
    block: &'a Block,
    kinds: &[&'static str],
    what: &str,
    parent: &str,
) -> ProviderResult<(&'static str, &'a Block)> {
    let mut set = kinds
        .iter()
        .filter_map(|kind| blocks(block.get(*kind)).first().copied().map(|b| (*kind, b)));
    let first = set.next();
    if set.next().is_some() {
        return Err(ProviderError::validation(format!(
            "more than one type of {} in the same {} is not allowed",
            what, parent
        )));
    }
    first.ok_or_else(|| {
        ProviderError::validation(format!(
            "{} must contain at least one type of {}: {}",
            parent,
            what,
            one_of_names(kinds)
        ))
    })
}

fn expand_video_layers(block: &Block, h264: bool) -> Vec<Layer> {
    blocks(block.get("layer"))
        .into_iter()
        .map(|layer| {
            let video = VideoLayer {
                bitrate: block_int(layer, "bitrate").unwrap_or_default(),
                width: text(layer, "width"),
                height: text(layer, "height"),
                label: text(layer, "label"),
                max_bitrate: block_int(layer, "max_bitrate"),
                b_frames: block_int(layer, "b_frames"),
                frame_rate: text(layer, "frame_rate"),
                slices: block_int(layer, "slices"),
                adaptive_b_frame: block_bool(layer, "adaptive_b_frame_enabled"),
                buffer_window: text(layer, "buffer_window"),
                crf: block_float(layer, "crf"),
                level: text(layer, "level"),
                profile: text(layer, "profile"),
                reference_frames: block_int(layer, "reference_frames"),
                entropy_mode: text(layer, "entropy_mode"),
            };
            if h264 {
                Layer::H264(video)
            } else {
                Layer::H265(video)
            }
        })
        .collect()
}

fn expand_image_layers(block: &Block, jpg: bool) -> Vec<Layer> {
    blocks(block.get("layer"))
        .into_iter()
        .map(|layer| {
            let image = ImageLayer {
                width: text(layer, "width"),
                height: text(layer, "height"),
                label: text(layer, "label"),
                quality: block_int(layer, "quality"),
            };
            if jpg {
                Layer::Jpg(image)
            } else {
                Layer::Png(image)
            }
        })
        .collect()
}

fn expand_image(block: &Block, jpg: bool) -> Image {
    Image {
        label: text(block, "label"),
        start: text(block, "start").unwrap_or_default(),
        step: text(block, "step"),
        range: text(block, "range"),
        key_frame_interval: text(block, "key_frame_interval"),
        stretch_mode: text(block, "stretch_mode"),
        sync_mode: text(block, "sync_mode"),
        sprite_column: block_int(block, "sprite_column"),
        layers: expand_image_layers(block, jpg),
    }
}

fn expand_codec(block: &Block) -> ProviderResult<Codec> {
    let (kind, codec) = exactly_one(block, CODECS, "codec", "codec")?;
    Ok(match kind {
        "aac_audio" => Codec::AacAudio(AacAudio {
            label: text(codec, "label"),
            bitrate: block_int(codec, "bitrate"),
            channels: block_int(codec, "channels"),
            sampling_rate: block_int(codec, "sampling_rate"),
            profile: text(codec, "profile"),
        }),
        "dd_audio" => Codec::DdAudio(DdAudio {
            label: text(codec, "label"),
            bitrate: block_int(codec, "bitrate"),
            channels: block_int(codec, "channels"),
            sampling_rate: block_int(codec, "sampling_rate"),
        }),
        "copy_audio" => Codec::CopyAudio(CopyCodec {
            label: text(codec, "label"),
        }),
        "copy_video" => Codec::CopyVideo(CopyCodec {
            label: text(codec, "label"),
        }),
        "h264_video" => Codec::H264Video(H264Video {
            label: text(codec, "label"),
            complexity: text(codec, "complexity"),
            key_frame_interval: text(codec, "key_frame_interval"),
            rate_control_mode: text(codec, "rate_control_mode"),
            scene_change_detection: block_bool(codec, "scene_change_detection_enabled"),
            stretch_mode: text(codec, "stretch_mode"),
            sync_mode: text(codec, "sync_mode"),
            layers: expand_video_layers(codec, true),
        }),
        "h265_video" => Codec::H265Video(H265Video {
            label: text(codec, "label"),
            complexity: text(codec, "complexity"),
            key_frame_interval: text(codec, "key_frame_interval"),
            scene_change_detection: block_bool(codec, "scene_change_detection_enabled"),
            stretch_mode: text(codec, "stretch_mode"),
            sync_mode: text(codec, "sync_mode"),
            layers: expand_video_layers(codec, false),
        }),
        "jpg_image" => Codec::JpgImage(expand_image(codec, true)),
        _ => Codec::PngImage(expand_image(codec, false)),
    })
}

fn expand_format(block: &Block) -> ProviderResult<Format> {
    let (kind, format) = exactly_one(block, FORMATS, "format", "format")?;
    let filename_pattern = text(format, "filename_pattern").unwrap_or_default();
    let output_files = || {
        blocks(format.get("output_file"))
            .into_iter()
            .map(|file| OutputFile {
                labels: expand_string_list(file.get("labels")),
            })
            .collect()
    };
    Ok(match kind {
        "mp4" => Format::Mp4(MultiBitrateFormat {
            filename_pattern,
            output_files: output_files(),
        }),
        "transport_stream" => Format::TransportStream(MultiBitrateFormat {
            filename_pattern,
            output_files: output_files(),
        }),
        "jpg" => Format::Jpg(ImageFormat { filename_pattern }),
        _ => Format::Png(ImageFormat { filename_pattern }),
    })
}

fn expand_preset(output: &Block) -> ProviderResult<Preset> {
    let (kind, preset) = exactly_one(output, PRESETS, "preset", "output")?;
    Ok(match kind {
        "builtin_preset" => Preset::BuiltInStandardEncoder(BuiltInStandardEncoderPreset {
            preset_name: text(preset, "preset_name").unwrap_or_default(),
            configurations: blocks(preset.get("preset_configuration"))
                .first()
                .map(|c| PresetConfigurations {
                    complexity: text(c, "complexity"),
                    interleave_output: text(c, "interleave_output"),
                    key_frame_interval_in_seconds: block_float(c, "key_frame_interval_in_seconds"),
                    max_bitrate_bps: block_int(c, "max_bitrate_bps"),
                    max_height: block_int(c, "max_height"),
                    max_layers: block_int(c, "max_layers"),
                    min_bitrate_bps: block_int(c, "min_bitrate_bps"),
                    min_height: block_int(c, "min_height"),
                }),
        }),
        "audio_analyzer_preset" => Preset::AudioAnalyzer(AudioAnalyzerPreset {
            audio_language: text(preset, "audio_language"),
            mode: text(preset, "audio_analysis_mode"),
            experimental_options: expand_options(preset),
        }),
        "video_analyzer_preset" => Preset::VideoAnalyzer(VideoAnalyzerPreset {
            audio_language: text(preset, "audio_language"),
            mode: text(preset, "audio_analysis_mode"),
            insights_to_extract: text(preset, "insights_type"),
            experimental_options: expand_options(preset),
        }),
        "face_detector_preset" => Preset::FaceDetector(FaceDetectorPreset {
            resolution: text(preset, "analysis_resolution"),
            mode: text(preset, "face_redactor_mode"),
            blur_type: text(preset, "blur_type"),
            experimental_options: expand_options(preset),
        }),
        _ => Preset::StandardEncoder(StandardEncoderPreset {
            codecs: blocks(preset.get("codec"))
                .into_iter()
                .map(expand_codec)
                .collect::<ProviderResult<_>>()?,
            formats: blocks(preset.get("format"))
                .into_iter()
                .map(expand_format)
                .collect::<ProviderResult<_>>()?,
            experimental_options: expand_options(preset),
        }),
    })
}

fn expand(resource: &Resource) -> ProviderResult<Transform> {
    let outputs = resource
        .get_blocks("output")
        .into_iter()
        .map(|output| {
            Ok(TransformOutput {
                on_error: text(output, "on_error_action"),
                relative_priority: text(output, "relative_priority"),
                preset: expand_preset(output)?,
            })
        })
        .collect::<ProviderResult<_>>()?;

    Ok(Transform {
        properties: Some(TransformProperties {
            description: resource.get_str("description").map(str::to_string),
            outputs,
            ..TransformProperties::default()
        }),
        ..Transform::default()
    })
}

// =============================================================================
// Flatten
// =============================================================================

fn flatten_options(options: &Option<ExperimentalOptions>) -> Option<Value> {
    options.as_ref().map(|options| {
        Value::Map(
            options
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    })
}

fn flatten_video_layers(layers: &[Layer]) -> Value {
    Value::List(
        layers
            .iter()
            .filter_map(|layer| match layer {
                Layer::H264(l) | Layer::H265(l) => Some(l),
                _ => None,
            })
            .map(|l| {
                let mut block = Attributes::new();
                block.insert("bitrate".to_string(), Value::Int(l.bitrate));
                set(&mut block, "width", l.width.clone());
                set(&mut block, "height", l.height.clone());
                set(&mut block, "label", l.label.clone());
                set(&mut block, "max_bitrate", l.max_bitrate);
                set(&mut block, "b_frames", l.b_frames);
                set(&mut block, "frame_rate", l.frame_rate.clone());
                set(&mut block, "slices", l.slices);
                set(&mut block, "adaptive_b_frame_enabled", l.adaptive_b_frame);
                set(&mut block, "buffer_window", l.buffer_window.clone());
                set(&mut block, "crf", l.crf);
                set(&mut block, "level", l.level.clone());
                set(&mut block, "profile", l.profile.clone());
                set(&mut block, "reference_frames", l.reference_frames);
                set(&mut block, "entropy_mode", l.entropy_mode.clone());
                Value::Map(block)
            })
            .collect(),
    )
}

fn flatten_image(image: &Image) -> Attributes {
    let mut block = Attributes::new();
    block.insert("start".to_string(), Value::String(image.start.clone()));
    set(&mut block, "label", image.label.clone());
    set(&mut block, "step", image.step.clone());
    set(&mut block, "range", image.range.clone());
    set(&mut block, "key_frame_interval", image.key_frame_interval.clone());
    set(&mut block, "stretch_mode", image.stretch_mode.clone());
    set(&mut block, "sync_mode", image.sync_mode.clone());
    set(&mut block, "sprite_column", image.sprite_column);

    let layers: Vec<Value> = image
        .layers
        .iter()
        .filter_map(|layer| match layer {
            Layer::Jpg(l) | Layer::Png(l) => Some(l),
            _ => None,
        })
        .map(|l| {
            let mut layer = Attributes::new();
            set(&mut layer, "width", l.width.clone());
            set(&mut layer, "height", l.height.clone());
            set(&mut layer, "label", l.label.clone());
            set(&mut layer, "quality", l.quality);
            Value::Map(layer)
        })
        .collect();
    if !layers.is_empty() {
        block.insert("layer".to_string(), Value::List(layers));
    }
    block
}

fn flatten_codec(codec: &Codec) -> Option<Value> {
    let mut block = Attributes::new();
    let kind = match codec {
        Codec::AacAudio(c) => {
            set(&mut block, "label", c.label.clone());
            set(&mut block, "bitrate", c.bitrate);
            set(&mut block, "channels", c.channels);
            set(&mut block, "sampling_rate", c.sampling_rate);
            set(&mut block, "profile", c.profile.clone());
            "aac_audio"
        }
        Codec::DdAudio(c) => {
            set(&mut block, "label", c.label.clone());
            set(&mut block, "bitrate", c.bitrate);
            set(&mut block, "channels", c.channels);
            set(&mut block, "sampling_rate", c.sampling_rate);
            "dd_audio"
        }
        Codec::CopyAudio(c) => {
            set(&mut block, "label", c.label.clone());
            "copy_audio"
        }
        Codec::CopyVideo(c) => {
            set(&mut block, "label", c.label.clone());
            "copy_video"
        }
        Codec::H264Video(c) => {
            set(&mut block, "label", c.label.clone());
            set(&mut block, "complexity", c.complexity.clone());
            set(&mut block, "key_frame_interval", c.key_frame_interval.clone());
            set(&mut block, "rate_control_mode", c.rate_control_mode.clone());
            set(&mut block, "scene_change_detection_enabled", c.scene_change_detection);
            set(&mut block, "stretch_mode", c.stretch_mode.clone());
            set(&mut block, "sync_mode", c.sync_mode.clone());
            if !c.layers.is_empty() {
                block.insert("layer".to_string(), flatten_video_layers(&c.layers));
            }
            "h264_video"
        }
        Codec::H265Video(c) => {
            set(&mut block, "label", c.label.clone());
            set(&mut block, "complexity", c.complexity.clone());
            set(&mut block, "key_frame_interval", c.key_frame_interval.clone());
            set(&mut block, "scene_change_detection_enabled", c.scene_change_detection);
            set(&mut block, "stretch_mode", c.stretch_mode.clone());
            set(&mut block, "sync_mode", c.sync_mode.clone());
            if !c.layers.is_empty() {
                block.insert("layer".to_string(), flatten_video_layers(&c.layers));
            }
            "h265_video"
        }
        Codec::JpgImage(image) => {
            block = flatten_image(image);
            "jpg_image"
        }
        Codec::PngImage(image) => {
            block = flatten_image(image);
            "png_image"
        }
        Codec::Unknown(raw) => {
            debug!("skipping codec of unknown type {:?}", raw.discriminator);
            return None;
        }
    };

    let mut codec = Attributes::new();
    codec.insert(kind.to_string(), single_block(block));
    Some(Value::Map(codec))
}

fn flatten_format(format: &Format) -> Option<Value> {
    let mut block = Attributes::new();
    let kind = match format {
        Format::Mp4(f) | Format::TransportStream(f) => {
            block.insert(
                "filename_pattern".to_string(),
                Value::String(f.filename_pattern.clone()),
            );
            if !f.output_files.is_empty() {
                let files = f
                    .output_files
                    .iter()
                    .map(|file| {
                        let mut file_block = Attributes::new();
                        file_block.insert("labels".to_string(), flatten_string_list(&file.labels));
                        Value::Map(file_block)
                    })
                    .collect();
                block.insert("output_file".to_string(), Value::List(files));
            }
            if matches!(format, Format::Mp4(_)) {
                "mp4"
            } else {
                "transport_stream"
            }
        }
        Format::Jpg(f) | Format::Png(f) => {
            block.insert(
                "filename_pattern".to_string(),
                Value::String(f.filename_pattern.clone()),
            );
            if matches!(format, Format::Jpg(_)) { "jpg" } else { "png" }
        }
        Format::Unknown(raw) => {
            debug!("skipping format of unknown type {:?}", raw.discriminator);
            return None;
        }
    };

    let mut format = Attributes::new();
    format.insert(kind.to_string(), single_block(block));
    Some(Value::Map(format))
}

/// Attribute name and block for the preset an output uses
fn flatten_preset(preset: &Preset) -> Option<(&'static str, Attributes)> {
    let mut block = Attributes::new();
    let kind = match preset {
        Preset::BuiltInStandardEncoder(p) => {
            block.insert("preset_name".to_string(), Value::String(p.preset_name.clone()));
            if let Some(c) = &p.configurations {
                let mut configuration = Attributes::new();
                set(&mut configuration, "complexity", c.complexity.clone());
                set(&mut configuration, "interleave_output", c.interleave_output.clone());
                set(
                    &mut configuration,
                    "key_frame_interval_in_seconds",
                    c.key_frame_interval_in_seconds,
                );
                set(&mut configuration, "max_bitrate_bps", c.max_bitrate_bps);
                set(&mut configuration, "max_height", c.max_height);
                set(&mut configuration, "max_layers", c.max_layers);
                set(&mut configuration, "min_bitrate_bps", c.min_bitrate_bps);
                set(&mut configuration, "min_height", c.min_height);
                block.insert("preset_configuration".to_string(), single_block(configuration));
            }
            "builtin_preset"
        }
        Preset::AudioAnalyzer(p) => {
            set(&mut block, "audio_language", p.audio_language.clone());
            set(&mut block, "audio_analysis_mode", p.mode.clone());
            set(&mut block, "experimental_options", flatten_options(&p.experimental_options));
            "audio_analyzer_preset"
        }
        Preset::VideoAnalyzer(p) => {
            set(&mut block, "audio_language", p.audio_language.clone());
            set(&mut block, "audio_analysis_mode", p.mode.clone());
            set(&mut block, "insights_type", p.insights_to_extract.clone());
            set(&mut block, "experimental_options", flatten_options(&p.experimental_options));
            "video_analyzer_preset"
        }
        Preset::FaceDetector(p) => {
            set(&mut block, "analysis_resolution", p.resolution.clone());
            set(&mut block, "face_redactor_mode", p.mode.clone());
            set(&mut block, "blur_type", p.blur_type.clone());
            set(&mut block, "experimental_options", flatten_options(&p.experimental_options));
            "face_detector_preset"
        }
        Preset::StandardEncoder(p) => {
            block.insert(
                "codec".to_string(),
                Value::List(p.codecs.iter().filter_map(flatten_codec).collect()),
            );
            block.insert(
                "format".to_string(),
                Value::List(p.formats.iter().filter_map(flatten_format).collect()),
            );
            set(&mut block, "experimental_options", flatten_options(&p.experimental_options));
            "custom_preset"
        }
        Preset::Unknown(raw) => {
            debug!("skipping preset of unknown type {:?}", raw.discriminator);
            return None;
        }
    };
    Some((kind, block))
}

fn flatten(transform: &Transform, id: &TransformId) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("name".to_string(), Value::String(id.transform_name.clone()));
    attributes.insert(
        "resource_group_name".to_string(),
        Value::String(id.resource_group_name.clone()),
    );
    attributes.insert(
        "media_services_account_name".to_string(),
        Value::String(id.account_name.clone()),
    );

    let Some(props) = &transform.properties else {
        attributes.insert("output".to_string(), Value::List(vec![]));
        return attributes;
    };
    set(&mut attributes, "description", props.description.clone());
    let outputs = props
        .outputs
        .iter()
        .map(|output| {
            let mut block = Attributes::new();
            set(&mut block, "on_error_action", output.on_error.clone());
            set(&mut block, "relative_priority", output.relative_priority.clone());
            if let Some((kind, preset)) = flatten_preset(&output.preset) {
                block.insert(kind.to_string(), single_block(preset));
            }
            Value::Map(block)
        })
        .collect();
    attributes.insert("output".to_string(), Value::List(outputs));
    attributes
}

// =============================================================================
// Handler
// =============================================================================

#[async_trait]
impl ResourceHandler<ProviderContext> for TransformResource {
    fn resource_type(&self) -> &'static str {
        "azurerm_media_transform"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("An encoding or analysis recipe of a Media Services account")
            .attribute(
                AttributeSchema::new(
                    "name",
                    types::string_matching(
                        r"^[-a-zA-Z0-9(_)]{1,128}$",
                        "Transform name must be 1 - 128 characters long, can contain letters, numbers, underscores, and hyphens (but the first and last character must be a letter or number)",
                    ),
                )
                .required()
                .force_new(),
            )
            .attribute(
                AttributeSchema::new("resource_group_name", types::resource_group_name())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new(
                    "media_services_account_name",
                    types::string_matching(
                        r"^[-a-z0-9]{3,24}$",
                        "Media Services Account name must be 3 - 24 characters long, contain only lowercase letters and numbers",
                    ),
                )
                .required()
                .force_new(),
            )
            .attribute(AttributeSchema::new("description", types::non_empty_string()))
            .attribute(AttributeSchema::new("output", output_block()).required())
            .with_timeouts(Timeouts::minutes(30, 5, 30, 30))
    }

    fn validate_id(&self, id: &str) -> Result<(), ResourceIdError> {
        TransformId::parse(id).map(|_| ())
    }

    async fn create(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        let id = TransformId::new(
            &ctx.subscription_id,
            resource.get_str("resource_group_name").unwrap_or_default(),
            resource.get_str("media_services_account_name").unwrap_or_default(),
            resource.get_str("name").unwrap_or_default(),
        );
        let transform = expand(resource)?;
        let client = &ctx.clients.media.transforms;
        check_requires_import(ctx, client, &id, self.resource_type()).await?;

        let transform = client
            .create_or_update(&id, &transform)
            .await
            .map_err(|e| arm_error("creating", &id, e))?;
        info!("created {}", id);

        Ok(State::existing(resource.address.clone(), flatten(&transform, &id)).with_id(id.id()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        address: &ResourceAddress,
        id: &str,
    ) -> ProviderResult<State> {
        let id = TransformId::parse(id)?;
        let transform = ctx
            .clients
            .media
            .transforms
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?;

        Ok(match transform {
            Some(transform) => {
                State::existing(address.clone(), flatten(&transform, &id)).with_id(id.id())
            }
            None => gone(address, &id),
        })
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _from: &State,
        to: &Resource,
        _changed: &[String],
    ) -> ProviderResult<State> {
        let id = TransformId::parse(id)?;
        let transform = ctx
            .clients
            .media
            .transforms
            .create_or_update(&id, &expand(to)?)
            .await
            .map_err(|e| arm_error("updating", &id, e))?;

        Ok(State::existing(to.address.clone(), flatten(&transform, &id)).with_id(id.id()))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> ProviderResult<()> {
        let id = TransformId::parse(id)?;
        ctx.clients
            .media
            .transforms
            .delete(&id)
            .await
            .map_err(|e| arm_error("deleting", &id, e))?;
        info!("deleted {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use armada_core::differ::Diff;
    use armada_core::provider::{ErrorKind, Provider};
    use reqwest::Method;
    use serde_json::json;

    use crate::testing::{FakeArm, SUBSCRIPTION_ID, provider};

    use super::*;

    fn transform_id() -> String {
        format!(
            "/subscriptions/{}/resourceGroups/acctestRG-media/providers/Microsoft.Media/mediaServices/acctestmsa1/transforms/transform1",
            SUBSCRIPTION_ID
        )
    }

    fn block(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn list(items: Vec<Value>) -> Value {
        Value::List(items)
    }

    fn transform(outputs: Vec<Value>) -> Resource {
        Resource::new("azurerm_media_transform", "test")
            .with_attribute("name", "transform1")
            .with_attribute("resource_group_name", "acctestRG-media")
            .with_attribute("media_services_account_name", "acctestmsa1")
            .with_attribute("output", list(outputs))
    }

    fn builtin(name: &str) -> Value {
        block(vec![(
            "builtin_preset",
            list(vec![block(vec![("preset_name", Value::from(name))])]),
        )])
    }

    fn custom() -> Value {
        let h264 = block(vec![(
            "layer",
            list(vec![block(vec![
                ("bitrate", Value::Int(1_000_000)),
                ("label", Value::from("HD")),
            ])]),
        )]);
        block(vec![(
            "custom_preset",
            list(vec![block(vec![
                (
                    "codec",
                    list(vec![
                        block(vec![("aac_audio", list(vec![block(vec![])]))]),
                        block(vec![("h264_video", list(vec![h264]))]),
                    ]),
                ),
                (
                    "format",
                    list(vec![block(vec![(
                        "mp4",
                        list(vec![block(vec![(
                            "filename_pattern",
                            Value::from("test{Bitrate}"),
                        )])]),
                    )])]),
                ),
            ])]),
        )])
    }

    #[tokio::test]
    async fn custom_preset_is_tagged_and_read_back_without_drift() {
        let fake = Arc::new(FakeArm::new());
        let provider = provider(fake.clone());

        let state = provider.create(&transform(vec![custom()])).await.unwrap();
        assert_eq!(state.id, Some(transform_id()));

        let stored = fake.resource(&transform_id()).unwrap();
        let output = &stored["properties"]["outputs"][0];
        assert_eq!(output["onError"], "StopProcessingJob");
        assert_eq!(output["relativePriority"], "Normal");
        let preset = &output["preset"];
        assert_eq!(preset["@odata.type"], "#Microsoft.Media.StandardEncoderPreset");
        assert_eq!(preset["codecs"][0]["@odata.type"], "#Microsoft.Media.AacAudio");
        assert_eq!(preset["codecs"][0]["bitrate"], 128_000);
        assert_eq!(preset["codecs"][1]["@odata.type"], "#Microsoft.Media.H264Video");
        assert_eq!(preset["codecs"][1]["rateControlMode"], "ABR");
        let layer = &preset["codecs"][1]["layers"][0];
        assert_eq!(layer["@odata.type"], "#Microsoft.Media.H264Layer");
        assert_eq!(layer["adaptiveBFrame"], true);
        assert_eq!(layer["crf"], 23.0);
        assert_eq!(preset["formats"][0]["@odata.type"], "#Microsoft.Media.Mp4Format");

        let read = provider.read(&state.address, &transform_id()).await.unwrap();
        let unchanged = provider
            .update(&transform_id(), &read, &transform(vec![custom()]))
            .await
            .unwrap();
        assert_eq!(unchanged.id, Some(transform_id()));
        let puts = fake
            .requests()
            .iter()
            .filter(|(method, _)| *method == Method::PUT)
            .count();
        assert_eq!(puts, 1);
    }

    #[tokio::test]
    async fn plan_after_create_is_no_change() {
        let provider = provider(Arc::new(FakeArm::new()));
        let config = transform(vec![builtin("AdaptiveStreaming"), custom()]);
        let state = provider.create(&config).await.unwrap();

        let read = provider.read(&state.address, &transform_id()).await.unwrap();
        assert_eq!(provider.plan(&config, &read).unwrap(), Diff::NoChange);

        let reordered = transform(vec![custom(), builtin("AdaptiveStreaming")]);
        assert_eq!(
            provider.plan(&reordered, &read).unwrap(),
            Diff::Update {
                changed: vec!["output".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn outputs_update_in_place() {
        let fake = Arc::new(FakeArm::new());
        let provider = provider(fake.clone());
        let state = provider
            .create(&transform(vec![builtin("AACGoodQualityAudio")]))
            .await
            .unwrap();

        let updated = provider
            .update(
                &transform_id(),
                &state,
                &transform(vec![builtin("AACGoodQualityAudio"), builtin("AdaptiveStreaming")]),
            )
            .await
            .unwrap();
        assert_eq!(updated.get("output").and_then(Value::as_list).unwrap().len(), 2);

        let stored = fake.resource(&transform_id()).unwrap();
        assert_eq!(
            stored["properties"]["outputs"][1]["preset"]["presetName"],
            "AdaptiveStreaming"
        );
        assert!(fake.requests().iter().all(|(method, _)| *method != Method::DELETE));
    }

    #[tokio::test]
    async fn one_preset_per_output() {
        let fake = Arc::new(FakeArm::new());
        let provider = provider(fake.clone());
        let both = block(vec![
            (
                "builtin_preset",
                list(vec![block(vec![("preset_name", Value::from("AdaptiveStreaming"))])]),
            ),
            ("audio_analyzer_preset", list(vec![block(vec![])])),
        ]);

        let err = provider.create(&transform(vec![both])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("more than one type of preset"));

        let none = block(vec![("relative_priority", Value::from("High"))]);
        let err = provider.create(&transform(vec![none])).await.unwrap_err();
        assert!(err.to_string().contains("output must contain at least one type of preset"));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn codec_blocks_need_a_type() {
        let provider = provider(Arc::new(FakeArm::new()));
        let preset = block(vec![(
            "custom_preset",
            list(vec![block(vec![
                ("codec", list(vec![block(vec![])])),
                (
                    "format",
                    list(vec![block(vec![(
                        "png",
                        list(vec![block(vec![("filename_pattern", Value::from("thumb"))])]),
                    )])]),
                ),
            ])]),
        )]);

        let err = provider.create(&transform(vec![preset])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("codec must contain at least one type of codec"));
    }

    #[tokio::test]
    async fn analyzer_defaults_are_sent() {
        let fake = Arc::new(FakeArm::new());
        let provider = provider(fake.clone());
        let output = block(vec![(
            "video_analyzer_preset",
            list(vec![block(vec![("audio_language", Value::from("en-US"))])]),
        )]);

        provider.create(&transform(vec![output])).await.unwrap();
        let preset = &fake.resource(&transform_id()).unwrap()["properties"]["outputs"][0]["preset"];
        assert_eq!(preset["@odata.type"], "#Microsoft.Media.VideoAnalyzerPreset");
        assert_eq!(preset["mode"], "Standard");
        assert_eq!(preset["insightsToExtract"], "AllInsights");
    }

    #[tokio::test]
    async fn presets_of_unknown_type_are_skipped_on_read() {
        let fake = Arc::new(FakeArm::new().with_resource(
            &transform_id(),
            json!({
                "properties": {
                    "outputs": [{
                        "onError": "ContinueJob",
                        "relativePriority": "Low",
                        "preset": {"@odata.type": "#Microsoft.Media.FuturePreset"}
                    }]
                }
            }),
        ));
        let provider = provider(fake);
        let address = ResourceAddress::new("azurerm_media_transform", "test");

        let state = provider.read(&address, &transform_id()).await.unwrap();
        let outputs = state.get("output").and_then(Value::as_list).unwrap();
        let output = outputs[0].as_map().unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output["on_error_action"], Value::from("ContinueJob"));
    }

    #[tokio::test]
    async fn existing_transform_requires_import() {
        let fake = Arc::new(
            FakeArm::new().with_resource(&transform_id(), json!({"properties": {"outputs": []}})),
        );
        let provider = provider(fake);
        let err = provider
            .create(&transform(vec![builtin("AdaptiveStreaming")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("needs to be imported"));
    }

    #[tokio::test]
    async fn delete_then_read_is_gone() {
        let provider = provider(Arc::new(FakeArm::new()));
        let state = provider
            .create(&transform(vec![builtin("AdaptiveStreaming")]))
            .await
            .unwrap();

        provider.delete(&state.address, &transform_id()).await.unwrap();
        let read = provider.read(&state.address, &transform_id()).await.unwrap();
        assert!(!read.exists);
    }
}
