//! Fixed-size binary codec for per-tick avatar state
//!
//! Every update travels as a 19-byte big-endian frame:
//!
//! | Offset | Size | Field                         |
//! |--------|------|-------------------------------|
//! | 0      | 2    | id (u16)                      |
//! | 2      | 4    | location.x (f32)              |
//! | 6      | 4    | location.y (f32)              |
//! | 10     | 4    | location.z (f32)              |
//! | 14     | 2    | rotation.quaternion_y (i16)   |
//! | 16     | 2    | rotation.quaternion_w (i16)   |
//! | 18     | 1    | animation state (u8)          |
//!
//! Rotations are yaw-only, so the X and Z quaternion components are always
//! zero and never transmitted. The two remaining components are quantized to
//! signed 16-bit integers scaled by [`QUATERNION_SCALE`].

use crate::error::ProtocolError;

/// Size in bytes of one encoded [`AvatarUpdate`]
pub const FRAME_SIZE: usize = 19;

/// Scale applied to unit-range quaternion components before rounding
pub const QUATERNION_SCALE: f32 = 32767.0;

/// Largest error a quaternion component can pick up on a round trip
pub const QUATERNION_STEP: f32 = 1.0 / QUATERNION_SCALE;

/// Animation clip the remote avatar should be playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AnimationState {
    #[default]
    Idle = 0,
    Walking = 1,
    Running = 2,
}

impl AnimationState {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnimationState::Idle => "idle",
            AnimationState::Walking => "walking",
            AnimationState::Running => "running",
        }
    }
}

impl TryFrom<u8> for AnimationState {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(AnimationState::Idle),
            1 => Ok(AnimationState::Walking),
            2 => Ok(AnimationState::Running),
            other => Err(ProtocolError::UnknownAnimationState(other)),
        }
    }
}

impl From<AnimationState> for u8 {
    fn from(state: AnimationState) -> Self {
        state.to_byte()
    }
}

/// World-space position in single precision
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Location {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Yaw-only rotation expressed as the Y and W quaternion components
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub quaternion_y: f32,
    pub quaternion_w: f32,
}

impl Rotation {
    pub fn new(quaternion_y: f32, quaternion_w: f32) -> Self {
        Self {
            quaternion_y,
            quaternion_w,
        }
    }

    /// Builds the quaternion for a rotation of `yaw` radians around the up axis
    pub fn from_yaw(yaw: f32) -> Self {
        let half = yaw / 2.0;
        Self {
            quaternion_y: half.sin(),
            quaternion_w: half.cos(),
        }
    }
}

/// One avatar's transform and animation state at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AvatarUpdate {
    pub id: u16,
    pub location: Location,
    pub rotation: Rotation,
    pub state: AnimationState,
}

impl AvatarUpdate {
    pub fn new(id: u16, location: Location, rotation: Rotation, state: AnimationState) -> Self {
        Self {
            id,
            location,
            rotation,
            state,
        }
    }

    /// Zero pose in the idle state, used for freshly connected avatars
    pub fn idle(id: u16) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Encodes the update into its fixed 19-byte wire frame
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut frame = [0u8; FRAME_SIZE];
        frame[0..2].copy_from_slice(&self.id.to_be_bytes());
        frame[2..6].copy_from_slice(&self.location.x.to_be_bytes());
        frame[6..10].copy_from_slice(&self.location.y.to_be_bytes());
        frame[10..14].copy_from_slice(&self.location.z.to_be_bytes());
        frame[14..16].copy_from_slice(&quantize(self.rotation.quaternion_y).to_be_bytes());
        frame[16..18].copy_from_slice(&quantize(self.rotation.quaternion_w).to_be_bytes());
        frame[18] = self.state.to_byte();
        frame
    }

    /// Decodes a wire frame, rejecting anything that is not exactly one update
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let frame: &[u8; FRAME_SIZE] = frame
            .try_into()
            .map_err(|_| ProtocolError::InvalidFrameLength(frame.len()))?;

        let state = AnimationState::try_from(frame[18])?;

        Ok(Self {
            id: u16::from_be_bytes([frame[0], frame[1]]),
            location: Location {
                x: f32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]),
                y: f32::from_be_bytes([frame[6], frame[7], frame[8], frame[9]]),
                z: f32::from_be_bytes([frame[10], frame[11], frame[12], frame[13]]),
            },
            rotation: Rotation {
                quaternion_y: dequantize(i16::from_be_bytes([frame[14], frame[15]])),
                quaternion_w: dequantize(i16::from_be_bytes([frame[16], frame[17]])),
            },
            state,
        })
    }
}

/// Rounds a unit-range component to its 16-bit wire value
///
/// Out-of-range input is clamped to [-1, 1] first; NaN becomes 0. Rounding
/// (rather than truncating) makes `quantize(dequantize(v)) == v`, so a stored
/// update re-encodes to the exact bytes it arrived as.
pub fn quantize(component: f32) -> i16 {
    (component.clamp(-1.0, 1.0) * QUATERNION_SCALE).round() as i16
}

pub fn dequantize(value: i16) -> f32 {
    value as f32 / QUATERNION_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_update() -> AvatarUpdate {
        AvatarUpdate::new(
            42,
            Location::new(1.5, -2.25, 100.0),
            Rotation::new(0.7071, 0.7071),
            AnimationState::Running,
        )
    }

    #[test]
    fn test_animation_state_wire_values() {
        assert_eq!(AnimationState::Idle.to_byte(), 0);
        assert_eq!(AnimationState::Walking.to_byte(), 1);
        assert_eq!(AnimationState::Running.to_byte(), 2);

        assert_eq!(AnimationState::try_from(0), Ok(AnimationState::Idle));
        assert_eq!(AnimationState::try_from(1), Ok(AnimationState::Walking));
        assert_eq!(AnimationState::try_from(2), Ok(AnimationState::Running));
    }

    #[test]
    fn test_animation_state_rejects_unknown_bytes() {
        for byte in 3..=u8::MAX {
            assert_eq!(
                AnimationState::try_from(byte),
                Err(ProtocolError::UnknownAnimationState(byte))
            );
        }
    }

    #[test]
    fn test_encode_layout() {
        let frame = sample_update().encode();

        assert_eq!(frame.len(), FRAME_SIZE);
        assert_eq!(&frame[0..2], &[0x00, 0x2A]);
        assert_eq!(&frame[2..6], &1.5f32.to_be_bytes());
        assert_eq!(&frame[6..10], &(-2.25f32).to_be_bytes());
        assert_eq!(&frame[10..14], &100.0f32.to_be_bytes());
        assert_eq!(i16::from_be_bytes([frame[14], frame[15]]), 23170);
        assert_eq!(i16::from_be_bytes([frame[16], frame[17]]), 23170);
        assert_eq!(frame[18], 2);
    }

    #[test]
    fn test_example_scenario() {
        let decoded = AvatarUpdate::decode(&sample_update().encode()).unwrap();

        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.state, AnimationState::Running);
        assert_eq!(decoded.location.x, 1.5);
        assert_eq!(decoded.location.y, -2.25);
        assert_eq!(decoded.location.z, 100.0);
        assert_approx_eq!(decoded.rotation.quaternion_y, 0.7071, 3.1e-5);
        assert_approx_eq!(decoded.rotation.quaternion_w, 0.7071, 3.1e-5);
    }

    #[test]
    fn test_quaternion_error_bound() {
        for yaw_step in 0..64 {
            let yaw = yaw_step as f32 * std::f32::consts::TAU / 64.0 - std::f32::consts::PI;
            let rotation = Rotation::from_yaw(yaw);
            let update = AvatarUpdate::new(7, Location::default(), rotation, AnimationState::Idle);

            let decoded = AvatarUpdate::decode(&update.encode()).unwrap();

            assert_approx_eq!(decoded.rotation.quaternion_y, rotation.quaternion_y, 3.1e-5);
            assert_approx_eq!(decoded.rotation.quaternion_w, rotation.quaternion_w, 3.1e-5);
        }
    }

    #[test]
    fn test_location_is_lossless() {
        let update = AvatarUpdate::new(
            u16::MAX,
            Location::new(f32::MIN_POSITIVE, -123456.78, f32::MAX),
            Rotation::default(),
            AnimationState::Walking,
        );

        let decoded = AvatarUpdate::decode(&update.encode()).unwrap();

        assert_eq!(decoded.id, u16::MAX);
        assert_eq!(decoded.location, update.location);
        assert_eq!(decoded.state, AnimationState::Walking);
    }

    #[test]
    fn test_reencoding_decoded_frame_is_stable() {
        for raw in [i16::MIN, -32767, -23170, -1, 0, 1, 12345, 23170, 32766, i16::MAX] {
            assert_eq!(quantize(dequantize(raw)), raw.max(-32767));
        }

        let frame = sample_update().encode();
        assert_eq!(AvatarUpdate::decode(&frame).unwrap().encode(), frame);
    }

    #[test]
    fn test_quantize_clamps_out_of_range() {
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32767);
        assert_eq!(quantize(2.5), 32767);
        assert_eq!(quantize(-7.0), -32767);
        assert_eq!(quantize(f32::NAN), 0);
        assert_eq!(quantize(0.00001), 0);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let frame = sample_update().encode();

        assert_eq!(
            AvatarUpdate::decode(&frame[..18]),
            Err(ProtocolError::InvalidFrameLength(18))
        );
        assert_eq!(
            AvatarUpdate::decode(&[]),
            Err(ProtocolError::InvalidFrameLength(0))
        );

        let mut long = frame.to_vec();
        long.push(0);
        assert_eq!(
            AvatarUpdate::decode(&long),
            Err(ProtocolError::InvalidFrameLength(20))
        );
    }

    #[test]
    fn test_decode_rejects_unknown_state() {
        let mut frame = sample_update().encode();
        frame[18] = 3;

        assert_eq!(
            AvatarUpdate::decode(&frame),
            Err(ProtocolError::UnknownAnimationState(3))
        );
    }

    #[test]
    fn test_idle_update_is_zero_pose() {
        let update = AvatarUpdate::idle(9);

        assert_eq!(update.id, 9);
        assert_eq!(update.location, Location::new(0.0, 0.0, 0.0));
        assert_eq!(update.rotation, Rotation::new(0.0, 0.0));
        assert_eq!(update.state, AnimationState::Idle);
    }

    #[test]
    fn test_rotation_from_yaw() {
        let rotation = Rotation::from_yaw(std::f32::consts::FRAC_PI_2);
        assert_approx_eq!(rotation.quaternion_y, std::f32::consts::FRAC_1_SQRT_2, 1e-6);
        assert_approx_eq!(rotation.quaternion_w, std::f32::consts::FRAC_1_SQRT_2, 1e-6);
    }
}
