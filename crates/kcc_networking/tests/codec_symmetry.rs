//! # Codec Symmetry Integration Test
//!
//! Randomized encode/decode of full states and settings, and block
//! interpolation at its endpoints.

use kcc_core::{
    AuthorityBehavior, Features, InterpolationMode, KccSettings, MovementState, NetworkId, Shape, Vec3,
};
use kcc_networking::protocol::{byte_count, read_counters, ObservedCounters};
use kcc_networking::{decode_state, encode_state, interpolate_blocks, BlockInterpolation, WireError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GRID_HALF_STEP: f32 = 1.0 / 2048.0;

fn random_settings(rng: &mut StdRng) -> KccSettings {
    let mut settings = KccSettings::default();
    settings.shape = Shape::from_bits(rng.gen_range(0..2));
    settings.is_trigger = rng.gen();
    settings.force_predicted_look_rotation = rng.gen();
    settings.allow_client_teleports = rng.gen();
    settings.input_authority_behavior = AuthorityBehavior::from_bits(rng.gen_range(0..2));
    settings.state_authority_behavior = AuthorityBehavior::from_bits(rng.gen_range(0..2));
    settings.proxy_interpolation_mode = InterpolationMode::from_bits(rng.gen_range(0..2));
    settings.collider_layer = rng.gen_range(0..32);
    settings.collision_layer_mask = rng.gen();
    settings.features = Features::from_bits(rng.gen_range(0..8));
    settings.radius = rng.gen_range(0.1..2.0);
    settings.height = rng.gen_range(0.5..4.0);
    settings.extent = rng.gen_range(0.0..0.1);
    settings
}

fn random_state(rng: &mut StdRng) -> MovementState {
    let mut state = MovementState::new();
    state.target_position = Vec3::new(
        rng.gen_range(-5000.0..5000.0),
        rng.gen_range(-500.0..500.0),
        rng.gen_range(-5000.0..5000.0),
    );
    state.look_pitch = rng.gen_range(-90.0..90.0);
    state.look_yaw = rng.gen_range(-180.0..180.0);
    state.is_active = rng.gen();
    state.is_grounded = rng.gen();
    state.was_grounded = rng.gen();
    state.is_stepping_up = rng.gen();
    state.was_stepping_up = rng.gen();
    state.is_snapping_to_ground = rng.gen();
    state.was_snapping_to_ground = rng.gen();
    state.has_teleported = rng.gen();
    state.jump_frames = u32::from(rng.gen::<bool>());

    // Eight ids at most, the default networked capacity.
    let mut raw = 1;
    for list in [&mut state.collisions, &mut state.modifiers, &mut state.ignores] {
        for _ in 0..rng.gen_range(0..3) {
            list.add(NetworkId::object(raw), None);
            raw += 1;
        }
    }
    state
}

fn assert_networked_fields_match(expected: &MovementState, actual: &MovementState) {
    assert_eq!(actual.look_pitch, expected.look_pitch);
    assert_eq!(actual.look_yaw, expected.look_yaw);
    assert_eq!(actual.is_active, expected.is_active);
    assert_eq!(actual.is_grounded, expected.is_grounded);
    assert_eq!(actual.was_grounded, expected.was_grounded);
    assert_eq!(actual.is_stepping_up, expected.is_stepping_up);
    assert_eq!(actual.was_stepping_up, expected.was_stepping_up);
    assert_eq!(actual.is_snapping_to_ground, expected.is_snapping_to_ground);
    assert_eq!(actual.was_snapping_to_ground, expected.was_snapping_to_ground);
    assert_eq!(actual.has_teleported, expected.has_teleported);
    assert_eq!(actual.jump_frames, expected.jump_frames);
    assert_eq!(actual.collisions, expected.collisions);
    assert_eq!(actual.modifiers, expected.modifiers);
    assert_eq!(actual.ignores, expected.ignores);
}

#[test]
fn test_decode_inverts_encode() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let settings = random_settings(&mut rng);
        let state = random_state(&mut rng);
        let mut block = vec![0u8; byte_count(&settings)];
        encode_state(&state, &settings, &mut block).unwrap();

        let mut decoded = MovementState::new();
        let mut decoded_settings = KccSettings::default();
        decode_state(&block, &mut decoded, &mut decoded_settings).unwrap();

        assert!(decoded.target_position.distance(state.target_position) < 1e-5);
        assert_networked_fields_match(&state, &decoded);
        assert_eq!(decoded_settings, settings);
    }
}

#[test]
fn test_compressed_position_stays_on_grid() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut settings = KccSettings::default();
    settings.compress_network_position = true;

    for _ in 0..200 {
        let state = random_state(&mut rng);
        let mut block = vec![0u8; byte_count(&settings)];
        encode_state(&state, &settings, &mut block).unwrap();

        let mut decoded = MovementState::new();
        let mut decoded_settings = settings.clone();
        decode_state(&block, &mut decoded, &mut decoded_settings).unwrap();

        let error = decoded.target_position - state.target_position;
        for axis in [error.x, error.y, error.z] {
            assert!(axis.abs() <= GRID_HALF_STEP + 1e-4, "grid error {axis}");
        }
        assert_networked_fields_match(&state, &decoded);
    }
}

#[test]
fn test_truncated_blocks_are_rejected() {
    let settings = KccSettings::default();
    let mut block = vec![0u8; byte_count(&settings)];
    encode_state(&MovementState::new(), &settings, &mut block).unwrap();

    let mut state = MovementState::new();
    let mut decoded_settings = settings.clone();
    let result = decode_state(&block[..block.len() - 4], &mut state, &mut decoded_settings);
    assert!(matches!(result, Err(WireError::Truncated { .. })));
}

fn encoded(position: Vec3, yaw: f32, teleported: bool, previous: Option<&[u8]>) -> Vec<u8> {
    let settings = KccSettings::default();
    let mut state = MovementState::new();
    state.target_position = position;
    state.look_yaw = yaw;
    state.has_teleported = teleported;

    let mut block = previous.map_or_else(|| vec![0u8; byte_count(&settings)], <[u8]>::to_vec);
    encode_state(&state, &settings, &mut block).unwrap();
    block
}

fn interpolated(from: &[u8], to: &[u8], alpha: f32) -> MovementState {
    let mut state = MovementState::new();
    let mut settings = KccSettings::default();
    let interpolation = BlockInterpolation {
        alpha,
        from_tick: 10,
        to_tick: 11,
        delta_time: 1.0 / 60.0,
    };
    interpolate_blocks(from, to, &interpolation, &mut ObservedCounters::new(), &mut state, &mut settings).unwrap();
    state
}

#[test]
fn test_interpolation_endpoints_are_exact() {
    let from = encoded(Vec3::new(1.0, 2.0, 3.0), 10.0, false, None);
    let to = encoded(Vec3::new(4.0, 2.5, -3.0), 20.0, false, Some(from.as_slice()));

    let start = interpolated(&from, &to, 0.0);
    assert_eq!(start.target_position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(start.look_yaw, 10.0);

    let end = interpolated(&from, &to, 1.0);
    assert_eq!(end.target_position, Vec3::new(4.0, 2.5, -3.0));
    assert_eq!(end.look_yaw, 20.0);
}

#[test]
fn test_teleport_on_to_block_overrides_alpha() {
    let from = encoded(Vec3::new(1.0, 0.0, 0.0), 0.0, false, None);
    let to = encoded(Vec3::new(300.0, 0.0, 0.0), 90.0, true, Some(from.as_slice()));
    assert_ne!(read_counters(&from).unwrap().teleport, read_counters(&to).unwrap().teleport);

    for alpha in [0.0, 0.25, 0.5, 0.99, 1.0] {
        let state = interpolated(&from, &to, alpha);
        assert_eq!(state.target_position, Vec3::new(300.0, 0.0, 0.0));
        assert_eq!(state.look_yaw, 90.0);
        assert_eq!(state.real_velocity, Vec3::ZERO);
    }
}
