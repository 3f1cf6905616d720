pub mod booking;

pub use booking::{
    find_batch_duplicate, validate_row, validate_seat, BookingError, BookingService,
    BookingStore, CreatedOrder, HallLayout, OrderError, PgBookingStore, Place, TicketSpec,
};
