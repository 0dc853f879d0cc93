//! Frame-level error codes and codec errors.

use std::fmt;

/// Protocol error codes carried by RST_STREAM and GOAWAY
/// (RFC 7540 Section 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl ErrorCode {
    /// Codes outside the defined range are treated as INTERNAL_ERROR.
    pub fn from_u32(code: u32) -> Self {
        match code {
            0x0 => ErrorCode::NoError,
            0x1 => ErrorCode::ProtocolError,
            0x2 => ErrorCode::InternalError,
            0x3 => ErrorCode::FlowControlError,
            0x4 => ErrorCode::SettingsTimeout,
            0x5 => ErrorCode::StreamClosed,
            0x6 => ErrorCode::FrameSizeError,
            0x7 => ErrorCode::RefusedStream,
            0x8 => ErrorCode::Cancel,
            0x9 => ErrorCode::CompressionError,
            0xa => ErrorCode::ConnectError,
            0xb => ErrorCode::EnhanceYourCalm,
            0xc => ErrorCode::InadequateSecurity,
            0xd => ErrorCode::Http11Required,
            _ => ErrorCode::InternalError,
        }
    }

    pub fn to_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
        };
        f.write_str(name)
    }
}

/// Errors raised while parsing or validating a frame.
#[derive(Debug)]
pub enum FrameError {
    /// The buffer does not yet hold a complete frame.
    Incomplete,
    /// Declared payload length exceeds the negotiated maximum.
    FrameTooLarge { size: u32, max: u32 },
    /// Frame type is not allowed on stream 0.
    InvalidStreamZero { frame_type: u8 },
    /// Frame type requires a non-zero stream id.
    StreamIdRequired { frame_type: u8 },
    /// Payload length inconsistent with the frame type.
    InvalidPayloadLength {
        frame_type: u8,
        expected: usize,
        actual: usize,
    },
    /// Pad length byte points past the end of the payload.
    InvalidPadding {
        pad_length: u8,
        payload_length: usize,
    },
    /// A SETTINGS record carried a value outside its legal range.
    InvalidSettingValue { id: u16, value: u32 },
    /// WINDOW_UPDATE increment of zero or with the reserved bit set.
    InvalidWindowIncrement { increment: u32 },
    /// Frame violated a protocol rule not covered above.
    Protocol(ErrorCode),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Incomplete => write!(f, "incomplete frame"),
            FrameError::FrameTooLarge { size, max } => {
                write!(f, "frame length {} exceeds maximum {}", size, max)
            }
            FrameError::InvalidStreamZero { frame_type } => {
                write!(f, "frame type 0x{:02x} not allowed on stream 0", frame_type)
            }
            FrameError::StreamIdRequired { frame_type } => {
                write!(f, "frame type 0x{:02x} requires a stream id", frame_type)
            }
            FrameError::InvalidPayloadLength {
                frame_type,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "frame type 0x{:02x} expects {} payload bytes, got {}",
                    frame_type, expected, actual
                )
            }
            FrameError::InvalidPadding {
                pad_length,
                payload_length,
            } => {
                write!(
                    f,
                    "pad length {} exceeds payload of {} bytes",
                    pad_length, payload_length
                )
            }
            FrameError::InvalidSettingValue { id, value } => {
                write!(f, "setting 0x{:04x} has invalid value {}", id, value)
            }
            FrameError::InvalidWindowIncrement { increment } => {
                write!(f, "invalid window increment {}", increment)
            }
            FrameError::Protocol(code) => write!(f, "protocol error: {}", code),
        }
    }
}

impl std::error::Error for FrameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_roundtrip() {
        for raw in 0x0..=0xd {
            assert_eq!(ErrorCode::from_u32(raw).to_u32(), raw);
        }
    }

    #[test]
    fn unknown_error_codes_collapse_to_internal() {
        assert_eq!(ErrorCode::from_u32(0xe), ErrorCode::InternalError);
        assert_eq!(ErrorCode::from_u32(0xffff_ffff), ErrorCode::InternalError);
    }

    #[test]
    fn error_code_rfc_names() {
        assert_eq!(ErrorCode::NoError.to_string(), "NO_ERROR");
        assert_eq!(ErrorCode::FlowControlError.to_string(), "FLOW_CONTROL_ERROR");
        assert_eq!(ErrorCode::EnhanceYourCalm.to_string(), "ENHANCE_YOUR_CALM");
        assert_eq!(ErrorCode::Http11Required.to_string(), "HTTP_1_1_REQUIRED");
    }

    #[test]
    fn frame_error_messages() {
        let err = FrameError::FrameTooLarge {
            size: 20000,
            max: 16384,
        };
        assert_eq!(err.to_string(), "frame length 20000 exceeds maximum 16384");

        let err = FrameError::InvalidPadding {
            pad_length: 100,
            payload_length: 50,
        };
        assert_eq!(err.to_string(), "pad length 100 exceeds payload of 50 bytes");

        let err = FrameError::Protocol(ErrorCode::Cancel);
        assert_eq!(err.to_string(), "protocol error: CANCEL");
    }

    #[test]
    fn frame_error_implements_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<FrameError>();
    }
}
