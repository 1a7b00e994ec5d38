//! Domain records exchanged between server, client and the JSON data files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Case-insensitive equality over the full Unicode range.
///
/// Agrees with the lowercased keys of the ranking index, so a hotel always
/// matches the key derived from its own city.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.to_lowercase() == b.to_lowercase()
}

fn running_average(average: f64, count: u32, value: f64) -> f64 {
    (average * count as f64 + value) / (count as f64 + 1.0)
}

/// The four per-aspect scores carried by hotels and reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub cleaning: f64,
    pub position: f64,
    pub services: f64,
    pub quality: f64,
}

impl Rating {
    pub fn new(cleaning: f64, position: f64, services: f64, quality: f64) -> Self {
        Self {
            cleaning,
            position,
            services,
            quality,
        }
    }

    pub fn sum(&self) -> f64 {
        self.cleaning + self.position + self.services + self.quality
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub city: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub services: Vec<String>,
    /// Running average of the overall score.
    pub rate: f64,
    /// Running averages of the aspect scores.
    pub ratings: Rating,
    /// Number of accepted reviews.
    #[serde(default)]
    pub reviews: u32,
    /// Running average of review timestamps (ms), absent until the first review.
    #[serde(default)]
    pub avg_review_date: Option<u64>,
}

impl Hotel {
    pub fn new(id: u32, name: &str, city: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: String::new(),
            city: city.to_string(),
            phone: String::new(),
            services: Vec::new(),
            rate: 0.0,
            ratings: Rating::default(),
            reviews: 0,
            avg_review_date: None,
        }
    }

    pub fn is_in(&self, city: &str) -> bool {
        eq_ignore_case(&self.city, city)
    }

    /// Case-insensitive match on both name and city.
    pub fn matches(&self, name: &str, city: &str) -> bool {
        eq_ignore_case(&self.name, name) && self.is_in(city)
    }

    /// Folds one review into the running averages.
    ///
    /// Every average is updated from its previous value and the current
    /// review count only, then the count is incremented once.
    pub fn apply_review(&mut self, review: &Review) {
        let n = self.reviews;

        self.avg_review_date = Some(match self.avg_review_date {
            None => review.date,
            Some(avg) => {
                ((avg as u128 * n as u128 + review.date as u128) / (n as u128 + 1)) as u64
            }
        });

        self.rate = running_average(self.rate, n, review.rate);
        self.ratings = Rating {
            cleaning: running_average(self.ratings.cleaning, n, review.ratings.cleaning),
            position: running_average(self.ratings.position, n, review.ratings.position),
            services: running_average(self.ratings.services, n, review.ratings.services),
            quality: running_average(self.ratings.quality, n, review.ratings.quality),
        };

        self.reviews += 1;
    }
}

/// An accepted review. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub user_id: u32,
    pub hotel_id: u32,
    pub rate: f64,
    pub ratings: Rating,
    /// Submission time in ms since the epoch.
    pub date: u64,
}

/// Experience level derived from a user's review count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Badge {
    #[default]
    Recensore,
    RecensoreEsperto,
    Contributore,
    ContributoreEsperto,
    ContributoreSuper,
}

impl Badge {
    pub fn for_review_count(reviews: u32) -> Self {
        match reviews {
            0..=9 => Badge::Recensore,
            10..=19 => Badge::RecensoreEsperto,
            20..=29 => Badge::Contributore,
            30..=39 => Badge::ContributoreEsperto,
            _ => Badge::ContributoreSuper,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Badge::Recensore => "Recensore",
            Badge::RecensoreEsperto => "Recensore Esperto",
            Badge::Contributore => "Contributore",
            Badge::ContributoreEsperto => "Contributore Esperto",
            Badge::ContributoreSuper => "Contributore Super",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub reviews: u32,
    #[serde(default)]
    pub badge: Badge,
}

impl User {
    pub fn new(id: u32, username: &str, password: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            password: password.to_string(),
            reviews: 0,
            badge: Badge::Recensore,
        }
    }

    pub fn add_review(&mut self) {
        self.reviews += 1;
        self.refresh_badge();
    }

    /// Recomputes the badge from the review count.
    pub fn refresh_badge(&mut self) {
        self.badge = Badge::for_review_count(self.reviews);
    }
}
