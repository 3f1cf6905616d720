pub mod user;
pub mod genre;
pub mod actor;
pub mod hall;
pub mod movie;
pub mod session;
pub mod order;

pub use user::User;
pub use genre::Genre;
pub use actor::Actor;
pub use hall::CinemaHall;
pub use movie::Movie;
pub use session::MovieSession;
pub use order::{Order, Ticket};
