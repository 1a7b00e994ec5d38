//! Interactive menu driving one server connection.

use crate::input::{Choice, Console};
use crate::network::ServerConnection;
use crate::notifications::NotificationListener;
use crate::ClientError;
use log::warn;
use shared::{status, Hotel, Request, ReviewScores};
use std::io;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite};

/// How a menu session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The user chose to exit.
    Exit,
    /// The connection failed; the caller should reconnect.
    Lost,
}

pub fn register_message(code: i32) -> &'static str {
    match code {
        status::OK => "Registration successful",
        status::MISSING_USERNAME => "Error: username is required",
        status::MISSING_PASSWORD => "Error: password is required",
        status::DUPLICATE_USERNAME => "Error: username already taken",
        _ => "Error: unexpected reply",
    }
}

pub fn review_message(code: i32) -> &'static str {
    match code {
        status::OK => "Review submitted",
        status::HOTEL_NOT_FOUND => "Error: hotel not found",
        _ => "Error: invalid request",
    }
}

/// Pretty-prints a single hotel or a list of hotels sent as JSON.
pub fn format_hotels(json: &str) -> String {
    if let Ok(hotels) = serde_json::from_str::<Vec<Hotel>>(json) {
        return hotels.iter().map(format_hotel).collect::<Vec<_>>().join("\n");
    }
    match serde_json::from_str::<Hotel>(json) {
        Ok(hotel) => format_hotel(&hotel),
        Err(_) => json.to_string(),
    }
}

fn format_hotel(hotel: &Hotel) -> String {
    let mut out = format!("{} ({})\n", hotel.name, hotel.city);
    if !hotel.description.is_empty() {
        out.push_str(&format!("  {}\n", hotel.description));
    }
    if !hotel.phone.is_empty() {
        out.push_str(&format!("  Phone: {}\n", hotel.phone));
    }
    if !hotel.services.is_empty() {
        out.push_str(&format!("  Services: {}\n", hotel.services.join(", ")));
    }
    out.push_str(&format!(
        "  Rate: {:.2} over {} reviews (cleaning {:.2}, position {:.2}, services {:.2}, quality {:.2})\n",
        hotel.rate,
        hotel.reviews,
        hotel.ratings.cleaning,
        hotel.ratings.position,
        hotel.ratings.services,
        hotel.ratings.quality
    ));
    out
}

pub struct App<R, W> {
    console: Console<R, W>,
    notifications: Option<NotificationListener>,
    exit_message: String,
    authenticated: bool,
}

impl<R, W> App<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        console: Console<R, W>,
        notifications: Option<NotificationListener>,
        exit_message: &str,
    ) -> Self {
        Self {
            console,
            notifications,
            exit_message: exit_message.to_string(),
            authenticated: false,
        }
    }

    pub fn console(&self) -> &Console<R, W> {
        &self.console
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Stops the notification listener, if any.
    pub async fn shutdown(mut self) {
        if let Some(listener) = self.notifications.take() {
            listener.shutdown().await;
        }
    }

    /// Runs the menu over `conn` until the user exits or the connection fails.
    ///
    /// A lost connection also ends the login session, since the server binds
    /// sessions to connections.
    pub async fn serve<S>(&mut self, mut conn: ServerConnection<S>) -> io::Result<Outcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            self.print_notifications().await?;
            self.print_menu().await?;

            let choice = match self.console.choice("Choice: ").await? {
                Choice::Closed => 0,
                Choice::Invalid => {
                    self.console.println("\nError: enter a valid number.\n").await?;
                    continue;
                }
                Choice::Number(n) => n,
            };

            if choice == 0 {
                if let Err(e) = conn.close(&self.exit_message).await {
                    warn!("Failed to send exit message: {}", e);
                }
                self.console.println("\nGoodbye").await?;
                return Ok(Outcome::Exit);
            }
            if !(1..=6).contains(&choice) || (!self.authenticated && choice > 4) {
                self.console.println("\nInvalid choice, try again\n").await?;
                continue;
            }

            self.console.println("").await?;
            match self.perform(choice, &mut conn).await {
                Ok(()) => self.console.println("").await?,
                Err(ClientError::Console(e)) => return Err(e),
                Err(e) => {
                    warn!("Request failed: {}", e);
                    self.console.println("\nConnection to the server lost\n").await?;
                    self.authenticated = false;
                    return Ok(Outcome::Lost);
                }
            }
        }
    }

    async fn print_notifications(&mut self) -> io::Result<()> {
        let pending = match self.notifications.as_mut() {
            Some(listener) => listener.drain(),
            None => Vec::new(),
        };
        for message in pending {
            self.console.println(&format!("Notification: {message}\n")).await?;
        }
        Ok(())
    }

    async fn print_menu(&mut self) -> io::Result<()> {
        let mut menu = String::from("- Menu -\n 1) Register\n");
        menu.push_str(if self.authenticated { " 2) Logout\n" } else { " 2) Login\n" });
        menu.push_str(" 3) Search hotel\n 4) Search city\n");
        if self.authenticated {
            menu.push_str(" 5) Review a hotel\n 6) Show badge\n");
        }
        menu.push_str(" 0) Exit\n");
        self.console.print(&menu).await
    }

    async fn perform<S>(&mut self, choice: i32, conn: &mut ServerConnection<S>) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match choice {
            1 => {
                self.console.println("- Register -").await?;
                let Some((username, password)) = self.credentials().await? else {
                    return Ok(());
                };
                let code = conn.request_code(&Request::Register { username, password }.encode()).await?;
                self.console.println(&format!("\n{}", register_message(code))).await?;
            }
            2 if self.authenticated => {
                let code = conn.request_code(&Request::Logout.encode()).await?;
                if code == status::OK {
                    self.authenticated = false;
                    self.console.println("Logged out").await?;
                } else {
                    self.console.println("Error: logout failed").await?;
                }
            }
            2 => {
                self.console.println("- Login -").await?;
                let Some((username, password)) = self.credentials().await? else {
                    return Ok(());
                };
                let request = Request::Login {
                    username: username.clone(),
                    password,
                };
                let code = conn.request_code(&request.encode()).await?;
                if code == status::OK {
                    self.authenticated = true;
                    self.console
                        .println(&format!("\nWelcome back to HOTELIER, {username}"))
                        .await?;
                } else {
                    self.console.println("\nError: wrong username or password").await?;
                }
            }
            3 => {
                self.console.println("- Search hotel -").await?;
                let Some(hotel) = self.console.field("Hotel name: ").await? else {
                    return Ok(());
                };
                let Some(city) = self.console.field("City: ").await? else {
                    return Ok(());
                };
                let reply = conn.request_text(&Request::SearchHotel { hotel, city }.encode()).await?;
                if reply.is_empty() {
                    self.console.println("\n- Hotel not found -").await?;
                } else {
                    self.console
                        .println(&format!("\n- Hotel found -\n\n{}", format_hotels(&reply)))
                        .await?;
                }
            }
            4 => {
                self.console.println("- Search city -").await?;
                let Some(city) = self.console.field("City: ").await? else {
                    return Ok(());
                };
                let reply = conn
                    .request_text(&Request::SearchCity { city: city.clone() }.encode())
                    .await?;
                if reply.is_empty() {
                    self.console.println(&format!("\n- No hotels found in {city} -")).await?;
                } else {
                    self.console
                        .println(&format!("\n- Hotels in {city} -\n\n{}", format_hotels(&reply)))
                        .await?;
                }
            }
            5 => {
                self.console.println("- Review a hotel -").await?;
                let Some(request) = self.review_request().await? else {
                    return Ok(());
                };
                let code = conn.request_code(&request.encode()).await?;
                self.console.println(&format!("\n{}", review_message(code))).await?;
            }
            6 => {
                let badge = conn.request_text(&Request::ShowBadge.encode()).await?;
                self.console.println(&format!("Your badge: {badge}")).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn credentials(&mut self) -> io::Result<Option<(String, String)>> {
        let Some(username) = self.console.field("Username: ").await? else {
            return Ok(None);
        };
        let Some(password) = self.console.field("Password: ").await? else {
            return Ok(None);
        };
        Ok(Some((username, password)))
    }

    async fn review_request(&mut self) -> io::Result<Option<Request>> {
        let Some(hotel) = self.console.field("Hotel name: ").await? else {
            return Ok(None);
        };
        let Some(city) = self.console.field("City: ").await? else {
            return Ok(None);
        };

        let mut scores = [0; 5];
        let labels = [
            "Overall (1-5): ",
            "Cleaning (1-5): ",
            "Position (1-5): ",
            "Services (1-5): ",
            "Quality (1-5): ",
        ];
        for (score, label) in scores.iter_mut().zip(labels) {
            match self.console.score(label).await? {
                Some(value) => *score = value,
                None => return Ok(None),
            }
        }

        Ok(Some(Request::InsertReview {
            hotel,
            city,
            scores: Some(ReviewScores {
                overall: scores[0],
                cleaning: scores[1],
                position: scores[2],
                services: scores[3],
                quality: scores[4],
            }),
        }))
    }
}
