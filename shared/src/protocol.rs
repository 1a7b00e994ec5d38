//! Request and response payloads carried inside frames.
//!
//! Requests are `;`-separated fields with the opcode first. Responses are
//! either a bare 4-byte big-endian status code or a length-prefixed string,
//! depending on the opcode.

use crate::codec::encode_frame;
use crate::model::Rating;
use bytes::BufMut;
use std::fmt;

pub const FIELD_SEPARATOR: char = ';';

/// Response status codes, interpreted per opcode.
pub mod status {
    pub const OK: i32 = 0;

    pub const MISSING_USERNAME: i32 = 1;
    pub const MISSING_PASSWORD: i32 = 2;
    pub const DUPLICATE_USERNAME: i32 = 3;

    pub const BAD_CREDENTIALS: i32 = 1;

    pub const HOTEL_NOT_FOUND: i32 = 1;
    pub const INVALID_REVIEW: i32 = 2;

    /// Badge reply when the session user no longer exists.
    pub const BADGE_UNKNOWN_USER: &str = "Errore";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Register = 1,
    /// Login when anonymous, logout when a session is bound.
    Access = 2,
    SearchHotel = 3,
    SearchCity = 4,
    InsertReview = 5,
    ShowBadge = 6,
}

impl Opcode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Opcode::Register),
            2 => Some(Opcode::Access),
            3 => Some(Opcode::SearchHotel),
            4 => Some(Opcode::SearchCity),
            5 => Some(Opcode::InsertReview),
            6 => Some(Opcode::ShowBadge),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether the reply is a length-prefixed string rather than a bare status code.
    pub fn replies_with_text(self) -> bool {
        matches!(
            self,
            Opcode::SearchHotel | Opcode::SearchCity | Opcode::ShowBadge
        )
    }
}

/// Scores submitted with a review, each expected in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewScores {
    pub overall: i32,
    pub cleaning: i32,
    pub position: i32,
    pub services: i32,
    pub quality: i32,
}

impl ReviewScores {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 5;

    pub fn is_valid(&self) -> bool {
        [
            self.overall,
            self.cleaning,
            self.position,
            self.services,
            self.quality,
        ]
        .iter()
        .all(|score| (Self::MIN..=Self::MAX).contains(score))
    }

    pub fn rating(&self) -> Rating {
        Rating::new(
            self.cleaning as f64,
            self.position as f64,
            self.services as f64,
            self.quality as f64,
        )
    }

    fn parse(fields: &[&str]) -> Option<Self> {
        let mut scores = fields.iter().map(|f| f.parse::<i32>().ok());
        Some(Self {
            overall: scores.next()??,
            cleaning: scores.next()??,
            position: scores.next()??,
            services: scores.next()??,
            quality: scores.next()??,
        })
    }
}

/// A decoded request body.
///
/// Missing positional fields decode as empty strings so that the dispatcher
/// can answer with the matching failure code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Register {
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    /// Opcode 2 without parameters.
    Logout,
    SearchHotel {
        hotel: String,
        city: String,
    },
    SearchCity {
        city: String,
    },
    /// `scores` is `None` when fields are missing or not integers.
    InsertReview {
        hotel: String,
        city: String,
        scores: Option<ReviewScores>,
    },
    ShowBadge,
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Register { .. } => Opcode::Register,
            Request::Login { .. } | Request::Logout => Opcode::Access,
            Request::SearchHotel { .. } => Opcode::SearchHotel,
            Request::SearchCity { .. } => Opcode::SearchCity,
            Request::InsertReview { .. } => Opcode::InsertReview,
            Request::ShowBadge => Opcode::ShowBadge,
        }
    }

    /// Parses a request body. Returns `None` for unknown or non-numeric opcodes.
    pub fn parse(body: &str) -> Option<Self> {
        let mut fields: Vec<&str> = body.split(FIELD_SEPARATOR).collect();
        // Trailing empty fields count as absent.
        while fields.len() > 1 && fields.last() == Some(&"") {
            fields.pop();
        }

        let opcode = Opcode::from_code(fields.first()?.parse().ok()?)?;
        let field = |i: usize| fields.get(i).copied().unwrap_or_default().to_string();

        let request = match opcode {
            Opcode::Register => Request::Register {
                username: field(1),
                password: field(2),
            },
            Opcode::Access if fields.len() == 1 => Request::Logout,
            Opcode::Access => Request::Login {
                username: field(1),
                password: field(2),
            },
            Opcode::SearchHotel => Request::SearchHotel {
                hotel: field(1),
                city: field(2),
            },
            Opcode::SearchCity => Request::SearchCity { city: field(1) },
            Opcode::InsertReview => Request::InsertReview {
                hotel: field(1),
                city: field(2),
                scores: if fields.len() >= 8 {
                    ReviewScores::parse(&fields[3..8])
                } else {
                    None
                },
            },
            Opcode::ShowBadge => Request::ShowBadge,
        };
        Some(request)
    }

    /// Encodes the request body (without the frame prefix).
    pub fn encode(&self) -> String {
        let op = self.opcode().code();
        match self {
            Request::Register { username, password } | Request::Login { username, password } => {
                format!("{op};{username};{password}")
            }
            Request::Logout | Request::ShowBadge => op.to_string(),
            Request::SearchHotel { hotel, city } => format!("{op};{hotel};{city}"),
            Request::SearchCity { city } => format!("{op};{city}"),
            Request::InsertReview {
                hotel,
                city,
                scores: Some(s),
            } => format!(
                "{op};{hotel};{city};{};{};{};{};{}",
                s.overall, s.cleaning, s.position, s.services, s.quality
            ),
            Request::InsertReview {
                hotel,
                city,
                scores: None,
            } => format!("{op};{hotel};{city}"),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Register { username, .. } => write!(f, "register({username})"),
            Request::Login { username, .. } => write!(f, "login({username})"),
            other => write!(f, "{}", other.encode()),
        }
    }
}

/// A reply ready to be written back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Code(i32),
    Text(String),
}

impl Response {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Code(code) => {
                let mut buf = Vec::with_capacity(4);
                buf.put_i32(*code);
                buf
            }
            Response::Text(text) => encode_frame(text.as_bytes()),
        }
    }
}

/// Sentence multicast to clients when a city gets a new leading hotel.
pub fn leader_changed_message(city: &str, hotel: &str) -> String {
    format!("The new best hotel in {city} is '{hotel}'!")
}
