//! Maps decoded requests onto store operations and builds the replies.

use crate::connection::Session;
use crate::persistence::{snapshot, Collection, DataFiles, Snapshot};
use crate::ranking::RankingIndex;
use crate::store::Store;
use log::{debug, info, warn};
use serde::Serialize;
use shared::{current_timestamp, status, Request, Response, ReviewScores};
use std::sync::Arc;
use tokio::sync::RwLock;

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        warn!("Failed to serialize reply: {}", e);
        String::new()
    })
}

pub struct Dispatcher {
    store: Arc<RwLock<Store>>,
    index: Arc<RankingIndex>,
    /// Where mutations are saved. `None` keeps everything in memory.
    files: Option<DataFiles>,
}

impl Dispatcher {
    pub fn new(store: Arc<RwLock<Store>>, index: Arc<RankingIndex>, files: Option<DataFiles>) -> Self {
        Self {
            store,
            index,
            files,
        }
    }

    /// Handles one request body. Returns `None` when no reply is due.
    pub async fn handle(&self, session: &mut Session, body: &str) -> Option<Response> {
        let Some(request) = Request::parse(body) else {
            warn!("Ignoring request with unknown opcode: {:?}", body);
            return None;
        };
        debug!("Dispatching {}", request);

        let response = match request {
            Request::Register { username, password } => self.register(&username, &password).await,
            Request::Login { .. } | Request::Logout if session.is_authenticated() => {
                info!("User {} logged out", session.user_id());
                session.clear();
                Response::Code(status::OK)
            }
            Request::Login { username, password } => {
                self.login(session, &username, &password).await
            }
            Request::Logout => Response::Code(status::BAD_CREDENTIALS),
            Request::SearchHotel { hotel, city } => {
                let store = self.store.read().await;
                Response::Text(store.find_hotel(&hotel, &city).map(to_json).unwrap_or_default())
            }
            Request::SearchCity { city } => Response::Text(
                self.index
                    .get(&city)
                    .map(|ranking| to_json(ranking.as_slice()))
                    .unwrap_or_default(),
            ),
            Request::InsertReview { hotel, city, scores } => {
                self.insert_review(session, &hotel, &city, scores).await
            }
            Request::ShowBadge => {
                let store = self.store.read().await;
                let label = store
                    .user(session.user_id())
                    .map(|u| u.badge.label())
                    .unwrap_or(status::BADGE_UNKNOWN_USER);
                Response::Text(label.to_string())
            }
        };
        Some(response)
    }

    async fn register(&self, username: &str, password: &str) -> Response {
        let saved = {
            let mut store = self.store.write().await;
            match store.register(username, password) {
                Ok(_) => self.snapshot(&store, &[Collection::Users]),
                Err(e) => {
                    debug!("Registration of {:?} refused: {}", username, e);
                    return Response::Code(e.code());
                }
            }
        };
        if let Some(saved) = saved {
            saved.write().await;
        }
        Response::Code(status::OK)
    }

    async fn login(&self, session: &mut Session, username: &str, password: &str) -> Response {
        let store = self.store.read().await;
        match store.authenticate(username, password) {
            Some(id) => {
                session.bind(id);
                info!("User {} logged in", username);
                Response::Code(status::OK)
            }
            None => Response::Code(status::BAD_CREDENTIALS),
        }
    }

    async fn insert_review(
        &self,
        session: &Session,
        hotel: &str,
        city: &str,
        scores: Option<ReviewScores>,
    ) -> Response {
        let saved = {
            let mut store = self.store.write().await;
            match store.add_review(session.user_id(), hotel, city, scores, current_timestamp()) {
                Ok(review) => {
                    debug!("User {} reviewed hotel {}", review.user_id, review.hotel_id);
                    self.snapshot(
                        &store,
                        &[Collection::Reviews, Collection::Hotels, Collection::Users],
                    )
                }
                Err(e) => {
                    debug!("Review of {:?} in {:?} refused: {}", hotel, city, e);
                    return Response::Code(e.code());
                }
            }
        };
        if let Some(saved) = saved {
            saved.write().await;
        }
        Response::Code(status::OK)
    }

    fn snapshot(&self, store: &Store, collections: &[Collection]) -> Option<Snapshot> {
        self.files
            .as_ref()
            .map(|files| snapshot(store, files, collections))
    }
}
