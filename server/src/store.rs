//! In-memory domain store holding hotels, users and reviews.
//!
//! The store is not synchronized on its own. The multiplexer task is the only
//! writer; the ranking task only ever takes read access through the shared
//! lock, so every mutation below happens on a single task.

use log::info;
use shared::{status, Hotel, Review, ReviewScores, User};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("username is required")]
    MissingUsername,
    #[error("password is required")]
    MissingPassword,
    #[error("username already taken")]
    DuplicateUsername,
}

impl RegisterError {
    pub fn code(&self) -> i32 {
        match self {
            RegisterError::MissingUsername => status::MISSING_USERNAME,
            RegisterError::MissingPassword => status::MISSING_PASSWORD,
            RegisterError::DuplicateUsername => status::DUPLICATE_USERNAME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("scores missing, malformed or out of range")]
    InvalidScores,
    #[error("session is not bound to an existing user")]
    NotAuthenticated,
    #[error("hotel not found")]
    HotelNotFound,
}

impl ReviewError {
    pub fn code(&self) -> i32 {
        match self {
            ReviewError::InvalidScores | ReviewError::NotAuthenticated => status::INVALID_REVIEW,
            ReviewError::HotelNotFound => status::HOTEL_NOT_FOUND,
        }
    }
}

#[derive(Debug)]
pub struct Store {
    hotels: Vec<Hotel>,
    users: Vec<User>,
    reviews: Vec<Review>,
    /// Id handed to the next registered user.
    next_user_id: u32,
}

impl Default for Store {
    /// An empty store. User ids start at 1 since 0 marks an anonymous session.
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }
}

impl Store {
    /// Builds the store from loaded records.
    ///
    /// Badges are recomputed from review counts and the user id counter
    /// continues after the highest id present.
    pub fn new(hotels: Vec<Hotel>, mut users: Vec<User>, reviews: Vec<Review>) -> Self {
        for user in &mut users {
            user.refresh_badge();
        }
        let next_user_id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;

        Self {
            hotels,
            users,
            reviews,
            next_user_id,
        }
    }

    pub fn hotels(&self) -> &[Hotel] {
        &self.hotels
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn next_user_id(&self) -> u32 {
        self.next_user_id
    }

    /// Distinct hotel cities, lowercased.
    pub fn cities(&self) -> BTreeSet<String> {
        self.hotels.iter().map(|h| h.city.to_lowercase()).collect()
    }

    pub fn user(&self, id: u32) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// First hotel whose name and city match, ignoring case.
    pub fn find_hotel(&self, name: &str, city: &str) -> Option<&Hotel> {
        self.hotels.iter().find(|h| h.matches(name, city))
    }

    pub fn register(&mut self, username: &str, password: &str) -> Result<u32, RegisterError> {
        if username.is_empty() {
            return Err(RegisterError::MissingUsername);
        }
        if password.is_empty() {
            return Err(RegisterError::MissingPassword);
        }
        if self.users.iter().any(|u| u.username == username) {
            return Err(RegisterError::DuplicateUsername);
        }

        let id = self.next_user_id;
        self.next_user_id += 1;
        self.users.push(User::new(id, username, password));
        info!("Registered user {} with id {}", username, id);
        Ok(id)
    }

    /// Returns the id of the user matching both username and password exactly.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<u32> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        self.users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .map(|u| u.id)
    }

    /// Records a review by `user_id` and folds it into the hotel's averages.
    ///
    /// Checks run in a fixed order: scores present, user exists, scores in
    /// range, hotel exists.
    pub fn add_review(
        &mut self,
        user_id: u32,
        hotel_name: &str,
        city: &str,
        scores: Option<ReviewScores>,
        date: u64,
    ) -> Result<&Review, ReviewError> {
        let scores = scores.ok_or(ReviewError::InvalidScores)?;
        let user_idx = self
            .users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or(ReviewError::NotAuthenticated)?;
        if !scores.is_valid() {
            return Err(ReviewError::InvalidScores);
        }
        let hotel = self
            .hotels
            .iter_mut()
            .find(|h| h.matches(hotel_name, city))
            .ok_or(ReviewError::HotelNotFound)?;

        let review = Review {
            user_id,
            hotel_id: hotel.id,
            rate: scores.overall as f64,
            ratings: scores.rating(),
            date,
        };
        hotel.apply_review(&review);
        self.users[user_idx].add_review();
        self.reviews.push(review);

        Ok(&self.reviews[self.reviews.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Badge;

    fn scores(overall: i32, cleaning: i32) -> ReviewScores {
        ReviewScores {
            overall,
            cleaning,
            position: 3,
            services: 3,
            quality: 3,
        }
    }

    fn test_store() -> Store {
        Store::new(
            vec![
                Hotel::new(1, "Hotel Roma 1", "Roma"),
                Hotel::new(2, "Hotel Roma 2", "roma"),
                Hotel::new(3, "Hotel Milano 1", "Milano"),
            ],
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_user_ids_continue_after_highest() {
        let store = Store::new(
            Vec::new(),
            vec![User::new(4, "a", "x"), User::new(9, "b", "y"), User::new(2, "c", "z")],
            Vec::new(),
        );
        assert_eq!(store.next_user_id(), 10);

        assert_eq!(Store::default().next_user_id(), 1);
        assert_eq!(test_store().next_user_id(), 1);
    }

    #[test]
    fn test_badges_refreshed_on_load() {
        let mut user = User::new(1, "veteran", "pw");
        user.reviews = 25;
        let store = Store::new(Vec::new(), vec![user], Vec::new());
        assert_eq!(store.user(1).unwrap().badge, Badge::Contributore);
    }

    #[test]
    fn test_cities_are_lowercased_and_distinct() {
        let cities: Vec<String> = test_store().cities().into_iter().collect();
        assert_eq!(cities, vec!["milano".to_string(), "roma".to_string()]);
    }

    #[test]
    fn test_register_validation() {
        let mut store = test_store();
        assert_eq!(store.register("", "pw"), Err(RegisterError::MissingUsername));
        assert_eq!(store.register("alice", ""), Err(RegisterError::MissingPassword));
        assert_eq!(store.register("alice", "pw1"), Ok(1));
        assert_eq!(store.register("alice", "pw2"), Err(RegisterError::DuplicateUsername));
        assert_eq!(store.register("Alice", "pw2"), Ok(2));
        assert_eq!(store.users().len(), 2);
    }

    #[test]
    fn test_register_error_codes() {
        assert_eq!(RegisterError::MissingUsername.code(), 1);
        assert_eq!(RegisterError::MissingPassword.code(), 2);
        assert_eq!(RegisterError::DuplicateUsername.code(), 3);
    }

    #[test]
    fn test_authenticate_requires_exact_match() {
        let mut store = test_store();
        let id = store.register("alice", "pw1").unwrap();

        assert_eq!(store.authenticate("alice", "pw1"), Some(id));
        assert_eq!(store.authenticate("alice", "pw2"), None);
        assert_eq!(store.authenticate("ALICE", "pw1"), None);
        assert_eq!(store.authenticate("", ""), None);
    }

    #[test]
    fn test_add_review_updates_hotel_and_user() {
        let mut store = test_store();
        let id = store.register("alice", "pw1").unwrap();

        let review = store
            .add_review(id, "hotel roma 2", "ROMA", Some(scores(4, 5)), 1_000)
            .unwrap();
        assert_eq!(review.hotel_id, 2);
        assert_eq!(review.user_id, id);

        let hotel = store.find_hotel("Hotel Roma 2", "Roma").unwrap();
        assert_eq!(hotel.reviews, 1);
        assert_eq!(hotel.rate, 4.0);
        assert_eq!(hotel.ratings.cleaning, 5.0);
        assert_eq!(store.user(id).unwrap().reviews, 1);
        assert_eq!(store.reviews().len(), 1);
    }

    #[test]
    fn test_add_review_failures() {
        let mut store = test_store();
        let id = store.register("alice", "pw1").unwrap();

        assert_eq!(
            store.add_review(id, "Hotel Napoli 1", "Napoli", Some(scores(3, 3)), 0).unwrap_err(),
            ReviewError::HotelNotFound
        );
        assert_eq!(
            store.add_review(id, "Hotel Roma 1", "Roma", Some(scores(3, 6)), 0).unwrap_err(),
            ReviewError::InvalidScores
        );
        assert_eq!(
            store.add_review(id, "Hotel Roma 1", "Roma", None, 0).unwrap_err(),
            ReviewError::InvalidScores
        );
        assert_eq!(
            store.add_review(0, "Hotel Roma 1", "Roma", Some(scores(3, 3)), 0).unwrap_err(),
            ReviewError::NotAuthenticated
        );

        assert!(store.reviews().is_empty());
        assert_eq!(store.find_hotel("Hotel Roma 1", "Roma").unwrap().reviews, 0);
    }

    #[test]
    fn test_review_error_codes() {
        assert_eq!(ReviewError::HotelNotFound.code(), 1);
        assert_eq!(ReviewError::InvalidScores.code(), 2);
        assert_eq!(ReviewError::NotAuthenticated.code(), 2);
    }
}
