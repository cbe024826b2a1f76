use snafu::Snafu;

pub type CustomResult<T> = Result<T, Error>;

/// # Crate wide error type
/// every error that can reach a request boundary is one of these.
/// all of them are recoverable and none of them should take the
/// process down.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum Error {
    /// the raw time string a user submitted is not a valid lap time.
    #[snafu(display("invalid lap time: {reason}"))]
    InvalidFormat { reason: FormatError },

    /// a record id no longer points at the record it was read with.
    #[snafu(display("record not found in the current snapshot"))]
    NotFound,

    /// the backing collaborator (file or blob) could not be used.
    #[snafu(display("backing store unavailable: {message}"))]
    StoreUnavailable { message: String },

    /// the shared bulk delete password did not match.
    #[snafu(display("bulk delete rejected: wrong password"))]
    Unauthorized,
}

/// # Reasons a raw lap time gets rejected
/// kept separate from [Error] so the codec can report exactly what was
/// wrong with the input instead of a generic "invalid".
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum FormatError {
    #[snafu(display("expected exactly 6 digits, got {length} characters"))]
    BadLength { length: usize },

    #[snafu(display("time may only contain ASCII digits"))]
    NonDigit,

    #[snafu(display("seconds out of range: {seconds} > 59"))]
    SecondsOutOfRange { seconds: u8 },

    // a 3 digit field cannot exceed 999. the check exists anyway so the
    // range rule is stated in one place.
    #[snafu(display("milliseconds out of range: {milliseconds} > 999"))]
    MillisecondsOutOfRange { milliseconds: u16 },

    #[snafu(display("a lap time of 0:00.000 is not a valid lap"))]
    ZeroDuration,
}

impl Error {
    pub fn invalid(reason: FormatError) -> Error {
        Error::InvalidFormat { reason }
    }

    /// map the error onto the http status it is surfaced with.
    pub fn status(&self) -> rocket::http::Status {
        use rocket::http::Status;
        match self {
            Error::InvalidFormat { .. } => Status::UnprocessableEntity,
            Error::NotFound => Status::NotFound,
            Error::StoreUnavailable { .. } => Status::ServiceUnavailable,
            Error::Unauthorized => Status::Unauthorized,
        }
    }
}
