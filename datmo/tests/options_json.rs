//! Loading tone mapping options from JSON.

mod common;

use common::create_hdr_scene;
use datmo::{
    ColorCorrection, DisplayFunction, DisplayPreset, DisplaySelection, JobEvent, TonemapJob,
    TonemapOptions, WhiteAnchor,
};

#[test]
fn test_empty_object_is_default() {
    let opts: TonemapOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(opts, TonemapOptions::default());
}

#[test]
fn test_partial_options() {
    let json = r#"{
        "pregamma": 2.2,
        "xsize": 640,
        "operator": {
            "display": { "preset": "lcd_office" },
            "enhancement": 1.5,
            "white_anchor": { "luminance": 250.0 },
            "color_correction": "ratio",
            "saturation": 0.8
        }
    }"#;
    let opts: TonemapOptions = serde_json::from_str(json).unwrap();

    assert_eq!(opts.pregamma, 2.2);
    assert_eq!(opts.xsize, Some(640));
    assert_eq!(
        opts.operator.display,
        DisplaySelection::Preset(DisplayPreset::LcdOffice)
    );
    assert_eq!(opts.operator.white_anchor, WhiteAnchor::Luminance(250.0));
    assert_eq!(opts.operator.color_correction, ColorCorrection::Ratio);
    assert_eq!(opts.operator.display_size, Default::default());
    assert!(opts.validate().is_ok());
}

#[test]
fn test_custom_display_functions() {
    let json = r#"{
        "operator": {
            "display": {
                "function": { "type": "lookup", "params": [[0.0, 0.3], [0.5, 20.0], [1.0, 180.0]] }
            },
            "display_size": { "vres": 2160, "view_distance": 0.6, "screen_height": 0.35 }
        }
    }"#;
    let opts: TonemapOptions = serde_json::from_str(json).unwrap();
    let df = opts.operator.display.display_function();
    assert!((df.black_level() - 0.3).abs() < 1e-9);
    assert!((df.max_luminance() - 180.0).abs() < 1e-9);
    assert_eq!(opts.operator.display_size.vres, 2160);

    let bad = r#"{ "operator": { "display": { "function":
        { "type": "lookup", "params": [[0.0, 5.0], [1.0, 1.0]] } } } }"#;
    assert!(serde_json::from_str::<TonemapOptions>(bad).is_err());
}

#[test]
fn test_roundtrip_through_json() {
    let mut opts = TonemapOptions {
        xsize: Some(320),
        ..Default::default()
    };
    opts.operator.display = DisplaySelection::Function(
        DisplayFunction::gamma_gain_offset(2.4, 350.0, 0.3, 150.0, 0.02).unwrap(),
    );

    let json = serde_json::to_string(&opts).unwrap();
    let back: TonemapOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, opts);
}

#[test]
fn test_json_options_drive_a_job() {
    let opts: TonemapOptions =
        serde_json::from_str(r#"{ "xsize": 24, "operator": { "display": { "preset": "crt" } } }"#)
            .unwrap();
    let events = TonemapJob::display_adaptive(create_hdr_scene(48, 32), 48, opts).run_blocking();

    match &events[events.len() - 2] {
        JobEvent::ImageComputed(image, _) => assert_eq!(image.width(), 24),
        other => panic!("unexpected event {:?}", other),
    }
}
