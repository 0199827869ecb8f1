//! Encoding, decoding and interpolation of state blocks.
//!
//! Lossy fields: the position is snapped to the 1/1024 m grid when
//! `compress_network_position` is set, and `jump_frames` travels as a
//! single bit, so it decodes as 0 or 1.

use kcc_core::{
    AuthorityBehavior, Features, Interactions, InterpolationMode, KccSettings, MovementState, NetworkId, Shape,
};
use kcc_shared::{interpolate_range, lerp, Vec3};

use super::cursor::{WordReader, WordWriter};
use super::{
    byte_count, WireError, WireResult, BASE_WORD_COUNT, MAX_INTERACTIONS_PER_KIND, NETWORK_ID_WORDS,
    POSITION_ACCURACY,
};

/// Word index of the combined data word.
const COMBINED_DATA_WORD: usize = 8;

// Combined data bits.
const ACTIVE: u32 = 1 << 16;
const GROUNDED: u32 = 1 << 17;
const WAS_GROUNDED: u32 = 1 << 18;
const STEPPING_UP: u32 = 1 << 19;
const WAS_STEPPING_UP: u32 = 1 << 20;
const SNAPPING: u32 = 1 << 21;
const WAS_SNAPPING: u32 = 1 << 22;
const TELEPORTED: u32 = 1 << 23;
const JUMPED: u32 = 1 << 24;

// Combined settings bits.
const TRIGGER: u32 = 1 << 0;
const FORCE_PREDICTED_LOOK: u32 = 1 << 1;
const ALLOW_CLIENT_TELEPORTS: u32 = 1 << 2;

// ============================================================================
// BLOCK VIEWS
// ============================================================================

/// Teleport and jump counters of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockCounters {
    /// Incremented for every tick that teleported.
    pub teleport: u8,
    /// Incremented for every tick that jumped.
    pub jump: u8,
}

/// Position and look angles of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransformSample {
    /// Full precision target position.
    pub position: Vec3,
    /// Look pitch in degrees.
    pub look_pitch: f32,
    /// Look yaw in degrees.
    pub look_yaw: f32,
}

/// Counters seen by the last interpolation of an observer.
///
/// The first block an observer sees never reports a teleport or a jump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObservedCounters {
    teleport: Option<u8>,
    jump: Option<u8>,
}

impl ObservedCounters {
    /// Nothing observed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            teleport: None,
            jump: None,
        }
    }

    fn observe(last: &mut Option<u8>, counter: u8) -> bool {
        if *last == Some(counter) {
            return false;
        }
        let changed = last.is_some();
        *last = Some(counter);
        changed
    }

    /// Records `counter`; `true` if it differs from a previously seen one.
    pub fn observe_teleport(&mut self, counter: u8) -> bool {
        Self::observe(&mut self.teleport, counter)
    }

    /// Records `counter`; `true` if it differs from a previously seen one.
    pub fn observe_jump(&mut self, counter: u8) -> bool {
        Self::observe(&mut self.jump, counter)
    }

    /// Forgets the observed counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Clock values of a from/to block pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockInterpolation {
    /// Position between the blocks, 0 = from, 1 = to.
    pub alpha: f32,
    /// Tick of the from block.
    pub from_tick: i32,
    /// Tick of the to block.
    pub to_tick: i32,
    /// Fixed tick length.
    pub delta_time: f32,
}

// ============================================================================
// POSITION GRID
// ============================================================================

#[allow(clippy::cast_possible_truncation)]
fn quantize(value: f32) -> i32 {
    (value * POSITION_ACCURACY).round() as i32
}

#[allow(clippy::cast_precision_loss)]
fn dequantize(value: i32) -> f32 {
    value as f32 / POSITION_ACCURACY
}

fn read_grid_position(reader: &mut WordReader<'_>) -> WireResult<Vec3> {
    Ok(Vec3::new(
        dequantize(reader.read_i32()?),
        dequantize(reader.read_i32()?),
        dequantize(reader.read_i32()?),
    ))
}

/// Full precision target position of a block.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] if the block is shorter than the
/// position words.
pub fn read_position(block: &[u8]) -> WireResult<Vec3> {
    let mut reader = WordReader::new(block);
    let grid = read_grid_position(&mut reader)?;
    Ok(grid + reader.read_vec3()?)
}

/// Position and look angles of a block.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] if the block is shorter than the
/// transform words.
pub fn read_transform(block: &[u8]) -> WireResult<TransformSample> {
    let mut reader = WordReader::new(block);
    let grid = read_grid_position(&mut reader)?;
    let position = grid + reader.read_vec3()?;
    Ok(TransformSample {
        position,
        look_pitch: reader.read_f32()?,
        look_yaw: reader.read_f32()?,
    })
}

/// Teleport and jump counters of a block.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] if the block ends before the combined
/// data word.
pub fn read_counters(block: &[u8]) -> WireResult<BlockCounters> {
    let [teleport, jump, ..] = WordReader::at_word(block, COMBINED_DATA_WORD).read_u32()?.to_le_bytes();
    Ok(BlockCounters { teleport, jump })
}

// ============================================================================
// ENCODE
// ============================================================================

fn flag(value: bool, bit: u32) -> u32 {
    if value {
        bit
    } else {
        0
    }
}

fn combined_data(state: &MovementState, counters: BlockCounters) -> u32 {
    u32::from(counters.teleport)
        | u32::from(counters.jump) << 8
        | flag(state.is_active, ACTIVE)
        | flag(state.is_grounded, GROUNDED)
        | flag(state.was_grounded, WAS_GROUNDED)
        | flag(state.is_stepping_up, STEPPING_UP)
        | flag(state.was_stepping_up, WAS_STEPPING_UP)
        | flag(state.is_snapping_to_ground, SNAPPING)
        | flag(state.was_snapping_to_ground, WAS_SNAPPING)
        | flag(state.has_teleported, TELEPORTED)
        | flag(state.jump_frames != 0, JUMPED)
}

fn combined_settings(settings: &KccSettings) -> u32 {
    flag(settings.is_trigger, TRIGGER)
        | flag(settings.force_predicted_look_rotation, FORCE_PREDICTED_LOOK)
        | flag(settings.allow_client_teleports, ALLOW_CLIENT_TELEPORTS)
        | (settings.shape as u32 & 0b11) << 3
        | (settings.input_authority_behavior as u32 & 0b11) << 5
        | (settings.state_authority_behavior as u32 & 0b11) << 7
        | (settings.proxy_interpolation_mode as u32 & 0b11) << 9
        | (settings.collider_layer & 0b1_1111) << 11
        | (u32::from(settings.features.bits()) & 0b1_1111) << 16
}

fn valid_ids(list: &Interactions) -> impl Iterator<Item = NetworkId> + '_ {
    list.iter().map(|interaction| interaction.id).filter(|id| id.is_valid())
}

fn write_interactions(writer: &mut WordWriter<'_>, state: &MovementState, settings: &KccSettings) -> WireResult<()> {
    let max_total = settings.networked_interactions as usize;
    if max_total == 0 {
        return Ok(());
    }

    let lists = [&state.collisions, &state.modifiers, &state.ignores];
    let mut counts = [0usize; 3];
    let mut total = 0;
    for (count, list) in counts.iter_mut().zip(lists) {
        let available = valid_ids(list).count();
        *count = available.min(MAX_INTERACTIONS_PER_KIND).min(max_total - total);
        total += *count;
    }

    #[allow(clippy::cast_possible_truncation)]
    let packed = counts[0] as u32 | (counts[1] as u32) << 8 | (counts[2] as u32) << 16;
    writer.write_u32(packed)?;

    for (count, list) in counts.iter().zip(lists) {
        for id in valid_ids(list).take(*count) {
            writer.write_pod(&id)?;
        }
    }
    writer.write_zeros((max_total - total) * NETWORK_ID_WORDS)
}

/// Writes `state` and the networked part of `settings` into `block`.
///
/// The block is updated in place: teleport and jump counters continue from
/// the values already stored in it. Returns the bytes written.
///
/// # Errors
///
/// Returns [`WireError::BufferTooSmall`] if `block` cannot hold a full
/// block for `settings`.
pub fn encode_state(state: &MovementState, settings: &KccSettings, block: &mut [u8]) -> WireResult<usize> {
    let required = byte_count(settings);
    if block.len() < required {
        return Err(WireError::BufferTooSmall {
            required,
            available: block.len(),
        });
    }

    let previous = read_counters(block)?;
    let counters = BlockCounters {
        teleport: previous.teleport.wrapping_add(u8::from(state.has_teleported)),
        jump: previous.jump.wrapping_add(u8::from(state.has_jumped())),
    };

    let position = state.target_position;
    let grid = [quantize(position.x), quantize(position.y), quantize(position.z)];
    let residual = if settings.compress_network_position {
        Vec3::ZERO
    } else {
        position - Vec3::new(dequantize(grid[0]), dequantize(grid[1]), dequantize(grid[2]))
    };

    let mut writer = WordWriter::new(block);
    for value in grid {
        writer.write_i32(value)?;
    }
    writer.write_vec3(residual)?;
    writer.write_f32(state.look_pitch)?;
    writer.write_f32(state.look_yaw)?;
    writer.write_u32(combined_data(state, counters))?;
    writer.write_u32(combined_settings(settings))?;
    writer.write_u32(settings.collision_layer_mask)?;
    writer.write_f32(settings.radius)?;
    writer.write_f32(settings.height)?;
    writer.write_f32(settings.extent)?;
    debug_assert_eq!(writer.word_position(), BASE_WORD_COUNT);
    write_interactions(&mut writer, state, settings)?;

    Ok(writer.position())
}

// ============================================================================
// DECODE
// ============================================================================

fn read_interactions(reader: &mut WordReader<'_>, state: &mut MovementState, settings: &KccSettings) -> WireResult<()> {
    if settings.networked_interactions == 0 {
        return Ok(());
    }

    let packed = reader.read_u32()?;
    let counts = [packed & 0xFF, (packed >> 8) & 0xFF, (packed >> 16) & 0xFF];
    let lists = [&mut state.collisions, &mut state.modifiers, &mut state.ignores];

    for (count, list) in counts.into_iter().zip(lists) {
        list.clear();
        for _ in 0..count {
            let id: NetworkId = reader.read_pod()?;
            if id.is_valid() {
                list.add(id, None);
            }
        }
    }
    Ok(())
}

/// Reads a block into `state` and the networked part of `settings`.
///
/// Only networked fields are touched. Interactions come back without
/// collider handles; the host resolves them from the ids. Any non-zero
/// `jump_frames` comes back as 1.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] if the block is shorter than its
/// layout.
pub fn decode_state(block: &[u8], state: &mut MovementState, settings: &mut KccSettings) -> WireResult<()> {
    let mut reader = WordReader::new(block);

    let grid = read_grid_position(&mut reader)?;
    state.target_position = grid + reader.read_vec3()?;
    state.look_pitch = reader.read_f32()?;
    state.look_yaw = reader.read_f32()?;

    let data = reader.read_u32()?;
    state.is_active = data & ACTIVE != 0;
    state.is_grounded = data & GROUNDED != 0;
    state.was_grounded = data & WAS_GROUNDED != 0;
    state.is_stepping_up = data & STEPPING_UP != 0;
    state.was_stepping_up = data & WAS_STEPPING_UP != 0;
    state.is_snapping_to_ground = data & SNAPPING != 0;
    state.was_snapping_to_ground = data & WAS_SNAPPING != 0;
    state.has_teleported = data & TELEPORTED != 0;
    state.jump_frames = u32::from(data & JUMPED != 0);

    let combined = reader.read_u32()?;
    settings.is_trigger = combined & TRIGGER != 0;
    settings.force_predicted_look_rotation = combined & FORCE_PREDICTED_LOOK != 0;
    settings.allow_client_teleports = combined & ALLOW_CLIENT_TELEPORTS != 0;
    settings.shape = Shape::from_bits((combined >> 3) & 0b11);
    settings.input_authority_behavior = AuthorityBehavior::from_bits((combined >> 5) & 0b11);
    settings.state_authority_behavior = AuthorityBehavior::from_bits((combined >> 7) & 0b11);
    settings.proxy_interpolation_mode = InterpolationMode::from_bits((combined >> 9) & 0b11);
    settings.collider_layer = (combined >> 11) & 0b1_1111;
    settings.features = Features::from_bits((combined >> 16) & 0b1_1111);

    settings.collision_layer_mask = reader.read_u32()?;
    settings.radius = reader.read_f32()?;
    settings.height = reader.read_f32()?;
    settings.extent = reader.read_f32()?;

    read_interactions(&mut reader, state, settings)
}

// ============================================================================
// INTERPOLATE
// ============================================================================

/// Writes the state between two blocks into `state`.
///
/// Position and look angles are blended; a teleport between the blocks
/// snaps to `to`. Flags, settings and interactions are taken whole from
/// `from` below alpha 0.5 and from `to` above. `has_teleported` and the
/// jump flag report counter changes since the previous call with the same
/// `observed`.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] if either block is shorter than its
/// layout.
pub fn interpolate_blocks(
    from: &[u8],
    to: &[u8],
    interpolation: &BlockInterpolation,
    observed: &mut ObservedCounters,
    state: &mut MovementState,
    settings: &mut KccSettings,
) -> WireResult<()> {
    let alpha = interpolation.alpha;
    decode_state(if alpha < 0.5 { from } else { to }, state, settings)?;

    let from_transform = read_transform(from)?;
    let to_transform = read_transform(to)?;
    let from_counters = read_counters(from)?;
    let to_counters = read_counters(to)?;

    state.real_velocity = Vec3::ZERO;
    state.real_speed = 0.0;

    if from_counters.teleport == to_counters.teleport {
        state.base_position = from_transform.position;
        state.desired_position = to_transform.position;
        state.target_position = from_transform.position.lerp(to_transform.position, alpha);
        state.look_pitch = lerp(from_transform.look_pitch, to_transform.look_pitch, alpha);
        state.look_yaw = interpolate_range(from_transform.look_yaw, to_transform.look_yaw, -180.0, 180.0, alpha);

        let ticks = interpolation.to_tick - interpolation.from_tick;
        if ticks > 0 {
            #[allow(clippy::cast_precision_loss)]
            let elapsed = interpolation.delta_time * ticks as f32;
            state.real_velocity = (to_transform.position - from_transform.position) / elapsed;
            state.real_speed = state.real_velocity.length();
        }
    } else {
        state.base_position = to_transform.position;
        state.desired_position = to_transform.position;
        state.target_position = to_transform.position;
        state.look_pitch = to_transform.look_pitch;
        state.look_yaw = to_transform.look_yaw;
    }

    state.has_teleported = observed.observe_teleport(to_counters.teleport);
    state.jump_frames = u32::from(observed.observe_jump(to_counters.jump));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(settings: &KccSettings) -> Vec<u8> {
        vec![0u8; byte_count(settings)]
    }

    fn sample_state() -> MovementState {
        let mut state = MovementState::new();
        state.target_position = Vec3::new(12.345_678, -0.5, 1000.125);
        state.look_pitch = -33.5;
        state.look_yaw = 171.25;
        state.is_grounded = true;
        state.was_stepping_up = true;
        state.is_snapping_to_ground = true;
        state.collisions.add(NetworkId::object(4), None);
        state.modifiers.add(NetworkId::prefab(9, 1), None);
        state.ignores.add(NetworkId::object(5), None);
        state
    }

    #[test]
    fn test_round_trip_keeps_networked_fields() {
        let mut settings = KccSettings::default();
        settings.is_trigger = true;
        settings.collider_layer = 17;
        settings.collision_layer_mask = 0xDEAD_BEEF;
        settings.features = Features::CCD;
        settings.proxy_interpolation_mode = InterpolationMode::Transform;
        settings.input_authority_behavior = AuthorityBehavior::PredictFixedPredictRender;
        settings.radius = 0.4;

        let state = sample_state();
        let mut buffer = block(&settings);
        assert_eq!(encode_state(&state, &settings, &mut buffer).unwrap(), buffer.len());

        let mut decoded = MovementState::new();
        let mut decoded_settings = KccSettings::default();
        decoded_settings.networked_interactions = settings.networked_interactions;
        decode_state(&buffer, &mut decoded, &mut decoded_settings).unwrap();

        assert!(decoded.target_position.distance(state.target_position) < 1e-6);
        assert_eq!(decoded.look_pitch, state.look_pitch);
        assert_eq!(decoded.look_yaw, state.look_yaw);
        assert!(decoded.is_active);
        assert!(decoded.is_grounded);
        assert!(!decoded.was_grounded);
        assert!(decoded.was_stepping_up);
        assert!(decoded.is_snapping_to_ground);
        assert_eq!(decoded.collisions, state.collisions);
        assert_eq!(decoded.modifiers, state.modifiers);
        assert_eq!(decoded.ignores, state.ignores);
        assert_eq!(decoded_settings, settings);
    }

    #[test]
    fn test_jump_frames_collapse_to_one_bit() {
        let settings = KccSettings::default();
        let mut decoded = MovementState::new();
        let mut decoded_settings = KccSettings::default();

        for (sent, received) in [(0, 0), (1, 1), (3, 1)] {
            let mut state = sample_state();
            state.jump_frames = sent;
            let mut buffer = block(&settings);
            encode_state(&state, &settings, &mut buffer).unwrap();
            decode_state(&buffer, &mut decoded, &mut decoded_settings).unwrap();
            assert_eq!(decoded.jump_frames, received);
        }
    }

    #[test]
    fn test_compressed_position_lands_on_grid() {
        let mut settings = KccSettings::default();
        settings.compress_network_position = true;
        let mut buffer = block(&settings);
        encode_state(&sample_state(), &settings, &mut buffer).unwrap();

        let position = read_position(&buffer).unwrap();
        assert_eq!(position, Vec3::new(12.345_703, -0.5, 1000.125));
        assert_eq!(WordReader::at_word(&buffer, 3).read_vec3().unwrap(), Vec3::ZERO);
    }

    #[test]
    fn test_counters_continue_from_previous_block() {
        let settings = KccSettings::default();
        let mut buffer = block(&settings);
        let mut state = MovementState::new();

        state.has_teleported = true;
        state.jump_frames = 1;
        encode_state(&state, &settings, &mut buffer).unwrap();
        encode_state(&state, &settings, &mut buffer).unwrap();
        state.has_teleported = false;
        state.jump_frames = 2;
        encode_state(&state, &settings, &mut buffer).unwrap();

        assert_eq!(read_counters(&buffer).unwrap(), BlockCounters { teleport: 2, jump: 2 });
    }

    #[test]
    fn test_teleport_counter_wraps() {
        let settings = KccSettings::default();
        let mut buffer = block(&settings);
        buffer[COMBINED_DATA_WORD * 4] = 0xFF;

        let mut state = MovementState::new();
        state.has_teleported = true;
        encode_state(&state, &settings, &mut buffer).unwrap();

        assert_eq!(read_counters(&buffer).unwrap().teleport, 0);
    }

    #[test]
    fn test_interactions_are_capped_in_list_order() {
        let mut settings = KccSettings::default();
        settings.networked_interactions = 3;

        let mut state = MovementState::new();
        state.collisions.add(NetworkId::INVALID, None);
        state.collisions.add(NetworkId::object(1), None);
        state.collisions.add(NetworkId::object(2), None);
        state.modifiers.add(NetworkId::object(3), None);
        state.ignores.add(NetworkId::object(4), None);

        let mut buffer = block(&settings);
        encode_state(&state, &settings, &mut buffer).unwrap();
        assert_eq!(WordReader::at_word(&buffer, BASE_WORD_COUNT).read_u32().unwrap(), 2 | 1 << 8);

        let mut decoded = MovementState::new();
        decode_state(&buffer, &mut decoded, &mut settings).unwrap();
        assert_eq!(decoded.collisions.len(), 2);
        assert!(decoded.modifiers.contains(NetworkId::object(3)));
        assert!(decoded.ignores.is_empty());
    }

    #[test]
    fn test_short_buffers_are_rejected() {
        let settings = KccSettings::default();
        let mut buffer = vec![0u8; byte_count(&settings) - 1];
        assert!(matches!(
            encode_state(&MovementState::new(), &settings, &mut buffer),
            Err(WireError::BufferTooSmall { .. })
        ));

        let mut state = MovementState::new();
        let mut decoded_settings = KccSettings::default();
        assert!(matches!(
            decode_state(&buffer[..20], &mut state, &mut decoded_settings),
            Err(WireError::Truncated { .. })
        ));
    }

    fn pair(from: &MovementState, to: &MovementState, settings: &KccSettings) -> (Vec<u8>, Vec<u8>) {
        let mut from_block = block(settings);
        encode_state(from, settings, &mut from_block).unwrap();
        let mut to_block = from_block.clone();
        encode_state(to, settings, &mut to_block).unwrap();
        (from_block, to_block)
    }

    #[test]
    fn test_interpolation_blends_and_derives_velocity() {
        let mut settings = KccSettings::default();
        let mut from = MovementState::new();
        from.look_yaw = 170.0;
        let mut to = MovementState::new();
        to.target_position = Vec3::new(1.0, 0.0, 0.0);
        to.look_yaw = -170.0;
        to.is_grounded = true;
        let (from_block, to_block) = pair(&from, &to, &settings);

        let interpolation = BlockInterpolation {
            alpha: 0.25,
            from_tick: 10,
            to_tick: 12,
            delta_time: 0.5,
        };
        let mut observed = ObservedCounters::new();
        let mut state = MovementState::new();
        interpolate_blocks(&from_block, &to_block, &interpolation, &mut observed, &mut state, &mut settings).unwrap();

        assert!((state.target_position.x - 0.25).abs() < 1e-6);
        assert!((state.look_yaw - 175.0).abs() < 1e-4);
        assert!((state.real_velocity.x - 1.0).abs() < 1e-6);
        assert!(!state.is_grounded);
        assert!(!state.has_teleported);

        let late = BlockInterpolation { alpha: 0.75, ..interpolation };
        interpolate_blocks(&from_block, &to_block, &late, &mut observed, &mut state, &mut settings).unwrap();
        assert!(state.is_grounded);
    }

    #[test]
    fn test_teleport_between_blocks_snaps_and_reports_once() {
        let mut settings = KccSettings::default();
        let mut observed = ObservedCounters::new();
        let mut state = MovementState::new();

        let from = MovementState::new();
        let (from_block, _) = pair(&from, &from, &settings);
        let interpolation = BlockInterpolation {
            alpha: 0.0,
            from_tick: 1,
            to_tick: 2,
            delta_time: 0.1,
        };
        interpolate_blocks(&from_block, &from_block, &interpolation, &mut observed, &mut state, &mut settings).unwrap();
        assert!(!state.has_teleported);

        let mut to = MovementState::new();
        to.target_position = Vec3::new(50.0, 0.0, 0.0);
        to.has_teleported = true;
        let (from_block, to_block) = pair(&from, &to, &settings);

        interpolate_blocks(&from_block, &to_block, &interpolation, &mut observed, &mut state, &mut settings).unwrap();
        assert!(state.has_teleported);
        assert_eq!(state.target_position, to.target_position);
        assert_eq!(state.base_position, to.target_position);
        assert!(state.real_velocity.is_zero());

        interpolate_blocks(&from_block, &to_block, &interpolation, &mut observed, &mut state, &mut settings).unwrap();
        assert!(!state.has_teleported);
        assert_eq!(state.target_position, to.target_position);
    }

    #[test]
    fn test_observed_counters_skip_first_block() {
        let mut observed = ObservedCounters::new();
        assert!(!observed.observe_jump(3));
        assert!(!observed.observe_jump(3));
        assert!(observed.observe_jump(4));
        observed.reset();
        assert!(!observed.observe_jump(5));
    }
}
