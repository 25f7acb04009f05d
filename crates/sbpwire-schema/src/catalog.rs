//! Built-in message catalog.
//!
//! Shared GNSS field kinds (`gnss_signal`, `gps_time`, `carrier_phase`) and
//! the message types registered by [`MessageRegistry::builtin`](crate::MessageRegistry::builtin).

use crate::descriptor::{ArrayLen, FieldKind, FieldSpec, MessageDescriptor};
use crate::error::Result;

/// Periodic receiver heartbeat.
pub const MSG_HEARTBEAT: u16 = 0xFFFF;
/// GPS week number and time of week.
pub const MSG_GPS_TIME: u16 = 0x0102;
/// Pseudorange and carrier-phase observations.
pub const MSG_OBS: u16 = 0x004A;
/// Signals currently being tracked.
pub const MSG_SV_SIGNALS: u16 = 0x0B10;

/// Satellite identifier, signal code and a reserved byte (4 bytes).
pub fn gnss_signal() -> FieldKind {
    FieldKind::structure(
        "gnss_signal",
        vec![
            FieldSpec::new("sat", FieldKind::U16),
            FieldSpec::new("code", FieldKind::U8),
            FieldSpec::new("reserved", FieldKind::U8),
        ],
    )
}

/// Milliseconds into the GPS week and week number (6 bytes).
pub fn gps_time() -> FieldKind {
    FieldKind::structure(
        "gps_time",
        vec![
            FieldSpec::new("tow", FieldKind::U32),
            FieldSpec::new("wn", FieldKind::U16),
        ],
    )
}

/// Carrier phase in cycles, Q32.8 (5 bytes): signed whole cycles then 1/256 cycles.
pub fn carrier_phase() -> FieldKind {
    FieldKind::q32_8()
}

/// All built-in message descriptors.
pub fn messages() -> Result<Vec<MessageDescriptor>> {
    Ok(vec![
        MessageDescriptor::new(
            MSG_HEARTBEAT,
            "MSG_HEARTBEAT",
            vec![FieldSpec::new("flags", FieldKind::U32)],
        )?,
        MessageDescriptor::new(
            MSG_GPS_TIME,
            "MSG_GPS_TIME",
            vec![
                FieldSpec::new("wn", FieldKind::U16),
                FieldSpec::new("tow", FieldKind::U32),
                FieldSpec::new("ns_residual", FieldKind::S32),
                FieldSpec::new("flags", FieldKind::U8),
            ],
        )?,
        MessageDescriptor::new(
            MSG_OBS,
            "MSG_OBS",
            vec![
                FieldSpec::new(
                    "header",
                    FieldKind::structure(
                        "observation_header",
                        vec![
                            FieldSpec::new("t", gps_time()),
                            FieldSpec::new("n_obs", FieldKind::U8),
                        ],
                    ),
                ),
                FieldSpec::new(
                    "obs",
                    FieldKind::array(
                        FieldKind::structure(
                            "packed_obs_content",
                            vec![
                                FieldSpec::new("P", FieldKind::U32),
                                FieldSpec::new("L", carrier_phase()),
                                FieldSpec::new("cn0", FieldKind::U8),
                                FieldSpec::new("lock", FieldKind::U16),
                                FieldSpec::new("sid", gnss_signal()),
                            ],
                        ),
                        ArrayLen::Fill,
                    ),
                ),
            ],
        )?,
        MessageDescriptor::new(
            MSG_SV_SIGNALS,
            "MSG_SV_SIGNALS",
            vec![
                FieldSpec::new("n_sigs", FieldKind::U8),
                FieldSpec::new(
                    "sids",
                    FieldKind::array(gnss_signal(), ArrayLen::CountField("n_sigs".into())),
                ),
            ],
        )?,
    ])
}
