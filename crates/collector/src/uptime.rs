//! Uptime computed from node status history.

use std::collections::HashMap;

use db::{
    node_status_history, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PrimitiveDateTime,
    QueryFilter, QueryOrder,
};

/// Percentage of `[window_start, now]` a node spent online.
///
/// Events must be sorted by timestamp. Every online event restarts the open
/// span, so only the latest start before an offline event counts. A trailing
/// open span is closed at `now`.
pub fn uptime_percentage(
    events: &[(PrimitiveDateTime, bool)],
    window_start: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> f64 {
    let window = (now - window_start).as_seconds_f64();

    if window <= 0.0 {
        return 0.0;
    }

    let mut online = 0.0;
    let mut open: Option<PrimitiveDateTime> = None;

    for (timestamp, is_online) in events {
        match (*is_online, open) {
            (true, _) => open = Some(*timestamp),
            (false, Some(since)) => {
                online += (*timestamp - since).as_seconds_f64();
                open = None;
            }
            (false, None) => {}
        }
    }

    if let Some(since) = open {
        online += (now - since).as_seconds_f64();
    }

    (online / window * 100.0).clamp(0.0, 100.0)
}

/// Uptime of the provided nodes, keyed by node primary key.
///
/// `nodes` holds the primary key and the uptime accounting start of each
/// node. Nodes without history get zero uptime.
pub async fn node_uptimes(
    db: &DatabaseConnection,
    nodes: &[(i64, PrimitiveDateTime)],
    now: PrimitiveDateTime,
) -> Result<HashMap<i64, f64>, DbErr> {
    let mut events: HashMap<i64, Vec<(PrimitiveDateTime, bool)>> = HashMap::new();

    for chunk in nodes.chunks(500) {
        let history = node_status_history::Entity::find()
            .filter(node_status_history::Column::NodeId.is_in(chunk.iter().map(|(id, _)| *id)))
            .order_by_asc(node_status_history::Column::Timestamp)
            .order_by_asc(node_status_history::Column::Id)
            .all(db)
            .await?;

        for event in history {
            events
                .entry(event.node_id)
                .or_default()
                .push((event.timestamp, event.is_online));
        }
    }

    Ok(nodes
        .iter()
        .map(|(id, since)| {
            let history = events.get(id).map(Vec::as_slice).unwrap_or_default();
            (*id, uptime_percentage(history, *since, now))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use db::{node_status_history, ActiveValue, Duration, EntityTrait};

    use super::{node_uptimes, uptime_percentage};
    use crate::{
        status::{apply_transitions, Observation},
        testing::{create_database, datetime},
    };

    #[test]
    fn half_of_the_window() {
        let start = datetime(2024, 1, 1, 0);
        let now = start + Duration::hours(4);

        let events = [
            (start, true),
            (start + Duration::hours(1), false),
            (start + Duration::hours(3), true),
        ];

        assert_eq!(uptime_percentage(&events, start, now), 50.0);
    }

    #[test]
    fn always_online() {
        let start = datetime(2024, 1, 1, 0);

        assert_eq!(
            uptime_percentage(&[(start, true)], start, start + Duration::days(2)),
            100.0
        );
    }

    #[test]
    fn no_history() {
        let start = datetime(2024, 1, 1, 0);

        assert_eq!(uptime_percentage(&[], start, start + Duration::hours(1)), 0.0);
        assert_eq!(uptime_percentage(&[(start, true)], start, start), 0.0);
    }

    #[test]
    fn repeated_online_restarts_span() {
        let start = datetime(2024, 1, 1, 0);
        let now = start + Duration::hours(10);

        let events = [
            (start, true),
            (start + Duration::hours(3), true),
            (start + Duration::hours(5), false),
        ];

        assert_eq!(uptime_percentage(&events, start, now), 20.0);
    }

    #[tokio::test]
    async fn uptime_from_history() {
        let db = create_database().await;
        let start = datetime(2024, 1, 1, 0);

        apply_transitions(&db, &[Observation::online("0xa")], start)
            .await
            .expect("unable to apply");
        apply_transitions(
            &db,
            &[Observation::offline("0xa")],
            start + Duration::hours(6),
        )
        .await
        .expect("unable to apply");

        let uptimes = node_uptimes(&db, &[(1, start)], start + Duration::hours(8))
            .await
            .expect("unable to compute uptime");

        assert_eq!(uptimes.get(&1), Some(&75.0));
    }

    #[tokio::test]
    async fn repeated_online_in_history() {
        let db = create_database().await;
        let start = datetime(2024, 1, 1, 0);

        apply_transitions(&db, &[Observation::online("0xa")], start)
            .await
            .expect("unable to apply");

        let events = [(2, true), (4, false), (6, true), (7, false)].map(|(hours, online)| {
            node_status_history::ActiveModel {
                node_id: ActiveValue::Set(1),
                is_online: ActiveValue::Set(online),
                timestamp: ActiveValue::Set(start + Duration::hours(hours)),
                ..Default::default()
            }
        });

        node_status_history::Entity::insert_many(events)
            .exec_without_returning(&db)
            .await
            .expect("unable to insert history");

        let uptimes = node_uptimes(&db, &[(1, start)], start + Duration::hours(8))
            .await
            .expect("unable to compute uptime");

        assert_eq!(uptimes.get(&1), Some(&37.5));
    }
}
