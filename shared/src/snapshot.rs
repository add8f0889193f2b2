//! Fixed-size binary snapshot codec for per-tick race state
//!
//! Frame layout, all values little-endian:
//!
//! ```text
//! [u8 count] [record; count]
//! record = u32 id
//!          f32 angle, f32 cornering_intensity, f32 angular_velocity,
//!          f32 steer_angle, f32 throttle,
//!          f32 pos.x, f32 pos.y, f32 velocity.x, f32 velocity.y
//! ```
//!
//! Every record carries the id of the car object it describes, so receivers
//! never depend on the sender's iteration order. There is no version byte:
//! both peers must be built from the same layout.

use crate::car::CarPhysicsBody;
use crate::math::Vec2;
use crate::ObjectId;
use thiserror::Error;

/// Bytes taken by one packed car record.
pub const RECORD_SIZE: usize = 4 + 9 * 4;
/// Bytes taken by the player count header.
pub const FRAME_HEADER_SIZE: usize = 1;
/// Largest player count representable in the header.
pub const MAX_FRAME_RECORDS: usize = u8::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame is empty")]
    Empty,
    #[error("frame declares {declared} records but carries {actual} bytes of payload")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("{0} records exceed the frame header capacity")]
    TooManyRecords(usize),
    #[error("record at offset {offset} does not fit a {len} byte buffer")]
    OutOfBounds { offset: usize, len: usize },
}

/// Synchronized subset of one car's state, as carried by a snapshot record
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarSyncInfo {
    pub id: ObjectId,
    pub angle: f32,
    pub cornering_intensity: f32,
    pub angular_velocity: f32,
    pub steer_angle: f32,
    pub throttle: f32,
    pub pos: Vec2,
    pub velocity: Vec2,
}

impl CarSyncInfo {
    pub fn from_body(id: ObjectId, body: &CarPhysicsBody) -> Self {
        Self {
            id,
            angle: body.angle,
            cornering_intensity: body.cornering_intensity,
            angular_velocity: body.angular_velocity,
            steer_angle: body.steer_angle(),
            throttle: body.throttle,
            pos: body.pos,
            velocity: body.velocity,
        }
    }

    /// Overwrites the synchronized fields of `body` wholesale.
    pub fn apply_to(&self, body: &mut CarPhysicsBody) {
        body.angle = self.angle;
        body.cornering_intensity = self.cornering_intensity;
        body.angular_velocity = self.angular_velocity;
        body.set_steer_angle(self.steer_angle);
        body.throttle = self.throttle;

        body.pos = self.pos;
        body.velocity = self.velocity;
    }
}

/// Exact byte length of a frame carrying `count` records.
pub fn frame_len(count: usize) -> usize {
    FRAME_HEADER_SIZE + count * RECORD_SIZE
}

/// Writes one record into `buffer` starting at `offset`.
pub fn pack(info: &CarSyncInfo, buffer: &mut [u8], offset: usize) -> Result<(), FrameError> {
    let len = buffer.len();
    let record = buffer
        .get_mut(offset..offset + RECORD_SIZE)
        .ok_or(FrameError::OutOfBounds { offset, len })?;

    record[0..4].copy_from_slice(&info.id.to_le_bytes());

    let floats = [
        info.angle,
        info.cornering_intensity,
        info.angular_velocity,
        info.steer_angle,
        info.throttle,
        info.pos.x,
        info.pos.y,
        info.velocity.x,
        info.velocity.y,
    ];
    for (i, value) in floats.iter().enumerate() {
        let start = 4 + i * 4;
        record[start..start + 4].copy_from_slice(&value.to_le_bytes());
    }

    Ok(())
}

/// Reads one record from `buffer` starting at `offset`.
pub fn unpack(buffer: &[u8], offset: usize) -> Result<CarSyncInfo, FrameError> {
    let record = buffer
        .get(offset..offset + RECORD_SIZE)
        .ok_or(FrameError::OutOfBounds {
            offset,
            len: buffer.len(),
        })?;

    let word = |index: usize| -> [u8; 4] {
        let start = index * 4;
        [
            record[start],
            record[start + 1],
            record[start + 2],
            record[start + 3],
        ]
    };
    let float = |index: usize| f32::from_le_bytes(word(index));

    Ok(CarSyncInfo {
        id: u32::from_le_bytes(word(0)),
        angle: float(1),
        cornering_intensity: float(2),
        angular_velocity: float(3),
        steer_angle: float(4),
        throttle: float(5),
        pos: Vec2::new(float(6), float(7)),
        velocity: Vec2::new(float(8), float(9)),
    })
}

/// Packs a whole room into one frame, records in the given order.
pub fn encode_frame(records: &[CarSyncInfo]) -> Result<Vec<u8>, FrameError> {
    if records.len() > MAX_FRAME_RECORDS {
        return Err(FrameError::TooManyRecords(records.len()));
    }

    let mut buffer = vec![0u8; frame_len(records.len())];
    buffer[0] = records.len() as u8;

    let mut offset = FRAME_HEADER_SIZE;
    for record in records {
        pack(record, &mut buffer, offset)?;
        offset += RECORD_SIZE;
    }

    Ok(buffer)
}

/// Unpacks a frame, rejecting any whose length disagrees with its header.
pub fn decode_frame(frame: &[u8]) -> Result<Vec<CarSyncInfo>, FrameError> {
    let (&count, payload) = frame.split_first().ok_or(FrameError::Empty)?;
    let count = count as usize;

    if payload.len() != count * RECORD_SIZE {
        return Err(FrameError::LengthMismatch {
            declared: count,
            actual: payload.len(),
        });
    }

    (0..count)
        .map(|i| unpack(frame, FRAME_HEADER_SIZE + i * RECORD_SIZE))
        .collect()
}
