//! Hard input limits. Anything over these is rejected up front with a
//! validation error, before any state is touched.

/// Payer name length cap (bytes).
pub const MAX_NAME_LEN: usize = 128;

/// Phone number length cap (bytes).
pub const MAX_PHONE_LEN: usize = 32;

/// Vehicle registration number length cap (bytes).
pub const MAX_VEHICLE_NUMBER_LEN: usize = 16;

/// Email length cap (bytes).
pub const MAX_EMAIL_LEN: usize = 254;

/// Cap on pending WAL appends before backpressure kicks in.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;
