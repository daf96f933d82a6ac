//! Integration tests driving the full bridge against a fake codec module.
//!
//! The fake module (tests/fake_codec.wat) implements the exact guest ABI:
//! it bump-allocates, copies the input through the host's bulk-copy stub,
//! and returns 64x64 frame descriptors with a deterministic payload.

use av1_bridge::{BridgeConfig, BridgeError, Decoder, GuestLayout};

const FAKE_CODEC: &[u8] = include_bytes!("fake_codec.wat");

/// Module whose init entry point reports failure with the zero sentinel.
const INIT_FAILS: &str = r#"
(module
  (func (export "_djs_init") (result i32) (i32.const 0))
  (func (export "_djs_alloc_obu") (param i32) (result i32) (i32.const 0))
  (func (export "_djs_decode_obu") (param i32 i32 i32 i32) (result i32) (i32.const 0))
  (func (export "_djs_free_frame") (param i32)))
"#;

/// Module whose decode path asks the host to grow linear memory.
const WANTS_GROWTH: &str = r#"
(module
  (import "env" "_emscripten_resize_heap" (func $grow (param i32) (result i32)))
  (func (export "_djs_init") (result i32) (i32.const 1))
  (func (export "_djs_alloc_obu") (param i32) (result i32) (i32.const 1024))
  (func (export "_djs_decode_obu") (param i32 i32 i32 i32) (result i32)
    (drop (call $grow (i32.const 134217728)))
    (i32.const 0))
  (func (export "_djs_free_frame") (param i32)))
"#;

/// Module whose decode path issues a stubbed syscall.
const WANTS_SYSCALL: &str = r#"
(module
  (import "env" "___syscall146" (func $writev (param i32 i32) (result i32)))
  (func (export "_djs_init") (result i32) (i32.const 1))
  (func (export "_djs_alloc_obu") (param i32) (result i32) (i32.const 1024))
  (func (export "_djs_decode_obu") (param i32 i32 i32 i32) (result i32)
    (drop (call $writev (i32.const 0) (i32.const 0)))
    (i32.const 0))
  (func (export "_djs_free_frame") (param i32)))
"#;

fn fake_decoder() -> Decoder {
    Decoder::create(BridgeConfig::from_bytes(FAKE_CODEC)).expect("failed to create decoder")
}

#[test]
fn test_create_rejects_missing_source() {
    let err = Decoder::create(BridgeConfig::default()).unwrap_err();
    assert!(matches!(err, BridgeError::Config(_)), "got {err:?}");
}

#[test]
fn test_create_rejects_conflicting_sources() {
    let mut config = BridgeConfig::from_bytes(FAKE_CODEC);
    config.module_path = Some("codec.wasm".into());
    let err = Decoder::create(config).unwrap_err();
    assert!(matches!(err, BridgeError::Config(_)), "got {err:?}");
}

#[test]
fn test_create_rejects_corrupt_module() {
    let err = Decoder::create(BridgeConfig::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]))
        .unwrap_err();
    assert!(matches!(err, BridgeError::Instantiate(_)), "got {err:?}");
}

#[test]
fn test_create_rejects_failed_guest_init() {
    let err = Decoder::create(BridgeConfig::from_bytes(INIT_FAILS.as_bytes())).unwrap_err();
    assert!(matches!(err, BridgeError::Init), "got {err:?}");
}

#[test]
fn test_planar_decode() {
    let mut decoder = fake_decoder();
    let unit: Vec<u8> = (1..=32).collect();

    let frame = decoder.decode_as_planar(&unit).expect("decode failed");
    assert_eq!(frame.width, 64);
    assert_eq!(frame.height, 64);
    // I420 at 64x64: Y plane + two quarter-size chroma planes
    assert_eq!(frame.data.len(), 64 * 64 + 2 * (32 * 32));
    assert_eq!(&frame.data[..unit.len()], unit.as_slice());
    assert!(frame.data[unit.len()..].iter().all(|&b| b == 0xab));
}

#[test]
fn test_bitmap_decode_matches_container_size() {
    let mut decoder = fake_decoder();

    let frame = decoder.decode_as_bitmap([5u8; 64]).expect("decode failed");
    assert_eq!(frame.width, 64);
    assert_eq!(frame.height, 64);

    // 54-byte BMP header plus 24bpp rows padded to 4-byte stride
    let stride = ((24 * 64 + 31) / 32) * 4;
    assert_eq!(frame.data.len(), 54 + stride * 64);
}

#[test]
fn test_zero_copy_matches_copying_decode() {
    let mut decoder = fake_decoder();
    let unit = [42u8; 100];

    let copied = decoder.decode_as_planar(unit).expect("copying decode failed");
    let view = decoder
        .decode_as_planar_ref(unit)
        .expect("zero-copy decode failed");

    assert_eq!(view.width, copied.width);
    assert_eq!(view.height, copied.height);
    assert_eq!(view.data, copied.data.as_slice());

    decoder.release_zero_copy_frame().expect("release failed");
}

#[test]
fn test_release_without_outstanding_frame_is_noop() {
    let mut decoder = fake_decoder();
    decoder.release_zero_copy_frame().expect("bare release failed");

    let view = decoder.decode_as_planar_ref([1u8; 8]).expect("decode failed");
    assert_eq!(view.data[0], 1);

    decoder.release_zero_copy_frame().expect("first release failed");
    decoder.release_zero_copy_frame().expect("redundant release failed");
}

#[test]
fn test_second_zero_copy_decode_supersedes_first() {
    let mut decoder = fake_decoder();

    let first = decoder.decode_as_planar_ref([7u8; 16]).expect("decode failed");
    assert_eq!(first.data[0], 7);

    let second = decoder.decode_as_planar_ref([9u8; 16]).expect("decode failed");
    assert_eq!(second.data[0], 9);

    decoder.release_zero_copy_frame().expect("release failed");
}

#[test]
fn test_empty_unit_is_an_allocation_failure() {
    let mut decoder = fake_decoder();
    let err = decoder.decode_as_planar([0u8; 0]).unwrap_err();
    assert!(matches!(err, BridgeError::GuestAlloc(_)), "got {err:?}");

    // The fake guest reported ENOMEM through the errno stub.
    assert_eq!(decoder.guest_errno().expect("errno read failed"), 12);
}

#[test]
fn test_decode_is_deterministic() {
    let mut decoder = fake_decoder();
    let unit: Vec<u8> = (0..64).map(|i| (i * 3) as u8).collect();

    let a = decoder.decode_as_bitmap(&unit).expect("first decode failed");
    let b = decoder.decode_as_bitmap(&unit).expect("second decode failed");

    assert_eq!(a.width, b.width);
    assert_eq!(a.height, b.height);
    assert_eq!(a.data, b.data);
}

#[test]
fn test_thread_stubs_never_exercised() {
    let mut decoder = fake_decoder();
    decoder.decode_as_planar([3u8; 24]).expect("decode failed");
    decoder.decode_as_bitmap([4u8; 24]).expect("decode failed");
    assert_eq!(decoder.thread_stub_calls(), 0);
}

#[test]
fn test_memory_growth_is_refused() {
    let mut decoder =
        Decoder::create(BridgeConfig::from_bytes(WANTS_GROWTH.as_bytes())).expect("create failed");
    let err = decoder.decode_as_planar([1u8; 4]).unwrap_err();
    assert!(
        matches!(err, BridgeError::Unsupported("memory growth")),
        "got {err:?}"
    );
}

#[test]
fn test_syscalls_are_refused() {
    let mut decoder =
        Decoder::create(BridgeConfig::from_bytes(WANTS_SYSCALL.as_bytes())).expect("create failed");
    let err = decoder.decode_as_planar([1u8; 4]).unwrap_err();
    assert!(
        matches!(err, BridgeError::Unsupported(s) if s.starts_with("syscall 146")),
        "got {err:?}"
    );
}

#[test]
fn test_alternate_layout_profile() {
    let config = BridgeConfig::from_bytes(FAKE_CODEC).layout(GuestLayout::avif_still());
    let mut decoder = Decoder::create(config).expect("create with avif layout failed");
    let frame = decoder.decode_as_planar([8u8; 16]).expect("decode failed");
    assert_eq!((frame.width, frame.height), (64, 64));
}
