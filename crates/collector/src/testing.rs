use db::{Database, DatabaseConnection, Date, PrimitiveDateTime};
use migration::MigratorTrait;
use time::{Month, Time};

pub(crate) async fn create_database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("unable to create test database");

    migration::Migrator::up(&db, None)
        .await
        .expect("unable to run migrations");

    db
}

pub(crate) fn datetime(year: i32, month: u8, day: u8, hour: u8) -> PrimitiveDateTime {
    let month = Month::try_from(month).expect("invalid month");
    let date = Date::from_calendar_date(year, month, day).expect("invalid date");
    let time = Time::from_hms(hour, 0, 0).expect("invalid time");

    PrimitiveDateTime::new(date, time)
}
