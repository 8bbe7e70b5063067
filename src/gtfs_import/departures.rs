// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

/// First and last date any service in the feed can run on, across both
/// calendar.txt ranges and calendar_dates.txt exceptions.
pub fn service_date_range(gtfs: &gtfs_structures::Gtfs) -> Option<(NaiveDate, NaiveDate)> {
    let calendar_bounds = gtfs
        .calendar
        .values()
        .flat_map(|calendar| [calendar.start_date, calendar.end_date]);

    let exception_dates = gtfs
        .calendar_dates
        .values()
        .flat_map(|dates| dates.iter().map(|date| date.date));

    let mut all_dates = calendar_bounds.chain(exception_dates);

    let first = all_dates.next()?;

    Some(all_dates.fold((first, first), |(start, end), date| {
        (start.min(date), end.max(date))
    }))
}

/// Dates within `range` on which `service_id` runs.
pub fn active_dates(
    gtfs: &gtfs_structures::Gtfs,
    service_id: &str,
    range: (NaiveDate, NaiveDate),
) -> BTreeSet<NaiveDate> {
    let (start, end) = range;

    // trip_days can list a date twice when calendar_dates re-adds a day the
    // calendar already covers
    gtfs.trip_days(service_id, start)
        .into_iter()
        .map(|offset| start + Duration::days(offset as i64))
        .filter(|date| *date <= end)
        .collect()
}

/// Every (trip source id, date) pair the feed schedules, sorted by trip id
/// and then date.
pub fn expand_trip_dates(gtfs: &gtfs_structures::Gtfs) -> Vec<(String, NaiveDate)> {
    let Some(range) = service_date_range(gtfs) else {
        return vec![];
    };

    let mut trips: Vec<(&String, &gtfs_structures::Trip)> = gtfs.trips.iter().collect();
    trips.sort_by(|a, b| a.0.cmp(b.0));

    let mut occurrences = vec![];

    for (trip_id, trip) in trips {
        for date in active_dates(gtfs, &trip.service_id, range) {
            occurrences.push((trip_id.clone(), date));
        }
    }

    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_import::test_fixtures::write_ferry_feed;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_covers_calendar_and_exceptions() {
        let dir = write_ferry_feed();
        let gtfs = gtfs_structures::Gtfs::new(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(
            service_date_range(&gtfs),
            Some((date(2021, 2, 1), date(2021, 2, 21)))
        );
    }

    #[test]
    fn weekday_service_with_exceptions() {
        let dir = write_ferry_feed();
        let gtfs = gtfs_structures::Gtfs::new(dir.path().to_str().unwrap()).unwrap();
        let range = service_date_range(&gtfs).unwrap();

        // weekdays 2021-02-15..19, minus Wednesday 17th, plus Sunday 21st
        let dates: Vec<NaiveDate> = active_dates(&gtfs, "weekdays", range).into_iter().collect();
        assert_eq!(
            dates,
            vec![
                date(2021, 2, 15),
                date(2021, 2, 16),
                date(2021, 2, 18),
                date(2021, 2, 19),
                date(2021, 2, 21),
            ]
        );
    }

    #[test]
    fn calendar_dates_only_service() {
        let dir = write_ferry_feed();
        let gtfs = gtfs_structures::Gtfs::new(dir.path().to_str().unwrap()).unwrap();
        let range = service_date_range(&gtfs).unwrap();

        let dates: Vec<NaiveDate> = active_dates(&gtfs, "special", range).into_iter().collect();
        assert_eq!(dates, vec![date(2021, 2, 1)]);
    }

    #[test]
    fn expansion_yields_one_pair_per_active_date() {
        let dir = write_ferry_feed();
        let gtfs = gtfs_structures::Gtfs::new(dir.path().to_str().unwrap()).unwrap();

        let pairs = expand_trip_dates(&gtfs);

        let evening: Vec<&(String, NaiveDate)> =
            pairs.iter().filter(|(trip, _)| trip == "evening").collect();
        let morning: Vec<&(String, NaiveDate)> =
            pairs.iter().filter(|(trip, _)| trip == "morning").collect();

        assert_eq!(morning.len(), 5);
        assert_eq!(evening.len(), 1);
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0], ("evening".to_string(), date(2021, 2, 1)));
    }
}
