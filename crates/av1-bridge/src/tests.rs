//! Unit tests for configuration and layout handling.

use super::config::*;
use super::error::BridgeError;
use super::memory::GuestOffset;

#[test]
fn test_layout_default_is_av1_build() {
    let layout = GuestLayout::default();
    assert_eq!(layout.total_memory, 64 * 1024 * 1024);
    assert_eq!(layout.table_size, 414);
    assert_eq!(layout.memory_pages(), 1024);
    assert_eq!(layout.dynamic_top_ptr, 385392);
    assert_eq!(layout.dynamic_base, 5628304);
    assert!(layout.validate().is_ok());
}

#[test]
fn test_layout_avif_build() {
    let layout = GuestLayout::avif_still();
    assert_eq!(layout.total_memory, 64 * 1024 * 1024);
    assert_ne!(layout.table_size, GuestLayout::av1_single_frame().table_size);
    assert!(layout.validate().is_ok());
}

#[test]
fn test_layout_rejects_unaligned_memory() {
    let layout = GuestLayout {
        total_memory: 64 * 1024 * 1024 + 1,
        ..GuestLayout::default()
    };
    assert!(matches!(layout.validate(), Err(BridgeError::Config(_))));
}

#[test]
fn test_layout_rejects_out_of_range_dynamic_top() {
    let layout = GuestLayout {
        dynamic_top_ptr: 64 * 1024 * 1024 - 2,
        ..GuestLayout::default()
    };
    assert!(matches!(layout.validate(), Err(BridgeError::Config(_))));
}

#[test]
fn test_layout_rejects_overlapping_bases() {
    let layout = GuestLayout {
        dynamic_base: 512,
        memory_base: 1024,
        ..GuestLayout::default()
    };
    assert!(matches!(layout.validate(), Err(BridgeError::Config(_))));
}

#[test]
fn test_symbols_default_names() {
    let symbols = GuestSymbols::default();
    assert_eq!(symbols.init, "_djs_init");
    assert_eq!(symbols.alloc_input, "_djs_alloc_obu");
    assert_eq!(symbols.decode, "_djs_decode_obu");
    assert_eq!(symbols.release_frame, "_djs_free_frame");
}

#[test]
fn test_layout_json_round_trip() {
    let layout = GuestLayout::avif_still();
    let json = serde_json::to_string(&layout).expect("serialize");
    let back: GuestLayout = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.total_memory, layout.total_memory);
    assert_eq!(back.table_size, layout.table_size);
    assert_eq!(back.dynamic_top_ptr, layout.dynamic_top_ptr);
    assert_eq!(back.errno_ptr, layout.errno_ptr);
    assert_eq!(back.symbols.decode, layout.symbols.decode);
}

#[test]
fn test_config_requires_a_source() {
    let config = BridgeConfig::default();
    assert!(matches!(config.source(), Err(BridgeError::Config(_))));
}

#[test]
fn test_config_rejects_both_sources() {
    let mut config = BridgeConfig::from_bytes(vec![0u8; 4]);
    config.module_path = Some("codec.wasm".into());
    assert!(matches!(config.source(), Err(BridgeError::Config(_))));
}

#[test]
fn test_config_resolves_bytes() {
    let config = BridgeConfig::from_bytes(vec![1, 2, 3]);
    assert!(matches!(config.source(), Ok(ModuleSource::Bytes(b)) if b == vec![1, 2, 3]));
}

#[test]
fn test_config_resolves_path() {
    let config = BridgeConfig::from_path("codec.wasm");
    assert!(matches!(config.source(), Ok(ModuleSource::Path(_))));
}

#[test]
fn test_config_builder_chain() {
    let config = BridgeConfig::from_bytes(Vec::new())
        .layout(GuestLayout::avif_still())
        .optimize(9);
    assert_eq!(config.layout.table_size, GuestLayout::avif_still().table_size);
    assert_eq!(config.optimization_level, 2);
}

#[test]
fn test_guest_offset_rejects_zero() {
    assert!(GuestOffset::new(0).is_none());
    let off = GuestOffset::new(1024).expect("non-zero offset");
    assert_eq!(off.get(), 1024);
}
