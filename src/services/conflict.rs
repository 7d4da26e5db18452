use chrono::NaiveDate;

use crate::models::{Appointment, Availability, TimeWindow, WeekDay};

/// How existing appointments block a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayPolicy {
    /// Any appointment with the consultant takes the whole day.
    #[default]
    OnePerConsultantDay,
    /// Only an appointment on the same slot and date blocks it.
    OnePerSlotDate,
}

impl DayPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "per_consultant_day" | "consultant_day" => Some(DayPolicy::OnePerConsultantDay),
            "per_slot_date" | "slot_date" => Some(DayPolicy::OnePerSlotDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unbookable {
    UnknownSlot(i64),
    WrongWeekday { slot: WeekDay, date: WeekDay },
    SlotTaken,
    DayTaken,
}

impl std::fmt::Display for Unbookable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unbookable::UnknownSlot(id) => {
                write!(f, "availability {id} is not offered by this consultant")
            }
            Unbookable::WrongWeekday { slot, date } => write!(
                f,
                "availability is on {} but the requested date is a {}",
                slot.as_str(),
                date.as_str()
            ),
            Unbookable::SlotTaken => write!(f, "this slot is already booked on that date"),
            Unbookable::DayTaken => write!(f, "the consultant already has an appointment that day"),
        }
    }
}

/// Decides which calendar dates a client may pick for one consultant.
///
/// Holds borrowed snapshots of the consultant's availabilities and appointments;
/// it performs no I/O, so the same checker backs the date picker and the
/// re-validation done inside the commit transaction.
pub struct ConflictChecker<'a> {
    availabilities: &'a [Availability],
    appointments: &'a [Appointment],
    policy: DayPolicy,
}

impl<'a> ConflictChecker<'a> {
    pub fn new(
        availabilities: &'a [Availability],
        appointments: &'a [Appointment],
        policy: DayPolicy,
    ) -> Self {
        Self {
            availabilities,
            appointments,
            policy,
        }
    }

    pub fn is_bookable(&self, date: NaiveDate, slot_id: Option<i64>) -> bool {
        match slot_id {
            Some(id) => self.check(date, id).is_ok(),
            None => {
                let weekday = WeekDay::of(date);
                self.availabilities
                    .iter()
                    .filter(|a| a.day == weekday)
                    .any(|a| self.occupancy(date, a.id).is_none())
            }
        }
    }

    /// Like [`is_bookable`](Self::is_bookable) for a chosen slot, with the reason on refusal.
    pub fn check(&self, date: NaiveDate, slot_id: i64) -> Result<(), Unbookable> {
        let slot = self
            .availabilities
            .iter()
            .find(|a| a.id == slot_id)
            .ok_or(Unbookable::UnknownSlot(slot_id))?;

        let weekday = WeekDay::of(date);
        if slot.day != weekday {
            return Err(Unbookable::WrongWeekday {
                slot: slot.day,
                date: weekday,
            });
        }

        match self.occupancy(date, slot.id) {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Whether `date` offers the given time window: some slot with exactly that
    /// window falls on the date's weekday and is still free.
    pub fn is_bookable_for_window(&self, date: NaiveDate, window: &TimeWindow) -> bool {
        let weekday = WeekDay::of(date);
        self.availabilities
            .iter()
            .filter(|a| a.day == weekday && a.window() == *window)
            .any(|a| self.occupancy(date, a.id).is_none())
    }

    /// Bookable dates in `[from, to]`, inclusive. When `slot_id` is set, dates
    /// are filtered to that slot's time window.
    pub fn bookable_dates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        slot_id: Option<i64>,
    ) -> Vec<NaiveDate> {
        let window = match slot_id {
            Some(id) => match self.availabilities.iter().find(|a| a.id == id) {
                Some(slot) => Some(slot.window()),
                None => return vec![],
            },
            None => None,
        };

        from.iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| match &window {
                Some(w) => self.is_bookable_for_window(*d, w),
                None => self.is_bookable(*d, None),
            })
            .collect()
    }

    fn occupancy(&self, date: NaiveDate, slot_id: i64) -> Option<Unbookable> {
        let mut same_day = self.appointments.iter().filter(|a| a.date == date);
        match self.policy {
            DayPolicy::OnePerConsultantDay => same_day.next().map(|a| {
                if a.availability_id == slot_id {
                    Unbookable::SlotTaken
                } else {
                    Unbookable::DayTaken
                }
            }),
            DayPolicy::OnePerSlotDate => same_day
                .any(|a| a.availability_id == slot_id)
                .then_some(Unbookable::SlotTaken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn slot(id: i64, day: WeekDay, start: (u32, u32), end: (u32, u32)) -> Availability {
        Availability {
            id,
            consultant_id: 1,
            day,
            start_hour: start.0,
            start_minutes: start.1,
            end_hour: end.0,
            end_minutes: end.1,
            booked: false,
            include_payment: false,
            price_minor: 0,
        }
    }

    fn appointment(slot_id: i64, date: &str) -> Appointment {
        Appointment {
            id: 1,
            consultant_username: "carol".to_string(),
            client_username: "xavier".to_string(),
            availability_id: slot_id,
            date: d(date),
            created_at: Utc::now().naive_utc(),
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn week() -> Vec<Availability> {
        vec![
            slot(1, WeekDay::Monday, (9, 0), (10, 0)),
            slot(2, WeekDay::Monday, (14, 0), (15, 0)),
            slot(3, WeekDay::Wednesday, (9, 0), (10, 0)),
        ]
    }

    #[test]
    fn test_weekday_must_match_some_slot() {
        let slots = week();
        let checker = ConflictChecker::new(&slots, &[], DayPolicy::default());
        // 2024-06-03 Monday, 2024-06-04 Tuesday, 2024-06-05 Wednesday
        assert!(checker.is_bookable(d("2024-06-03"), None));
        assert!(!checker.is_bookable(d("2024-06-04"), None));
        assert!(checker.is_bookable(d("2024-06-05"), None));
    }

    #[test]
    fn test_selected_slot_requires_its_weekday() {
        let slots = week();
        let checker = ConflictChecker::new(&slots, &[], DayPolicy::default());
        assert!(checker.is_bookable(d("2024-06-03"), Some(1)));
        assert_eq!(
            checker.check(d("2024-06-05"), 1),
            Err(Unbookable::WrongWeekday {
                slot: WeekDay::Monday,
                date: WeekDay::Wednesday
            })
        );
    }

    #[test]
    fn test_unknown_slot_is_not_bookable() {
        let slots = week();
        let checker = ConflictChecker::new(&slots, &[], DayPolicy::default());
        assert_eq!(checker.check(d("2024-06-03"), 99), Err(Unbookable::UnknownSlot(99)));
        assert!(checker.bookable_dates(d("2024-06-01"), d("2024-06-30"), Some(99)).is_empty());
    }

    #[test]
    fn test_booked_slot_date_is_taken() {
        let slots = week();
        let booked = vec![appointment(1, "2024-06-03")];
        let checker = ConflictChecker::new(&slots, &booked, DayPolicy::OnePerSlotDate);

        assert_eq!(checker.check(d("2024-06-03"), 1), Err(Unbookable::SlotTaken));
        // Next Monday is a different occurrence of the same slot.
        assert!(checker.is_bookable(d("2024-06-10"), Some(1)));
    }

    #[test]
    fn test_per_slot_policy_leaves_other_windows_open() {
        let slots = week();
        let booked = vec![appointment(1, "2024-06-03")];
        let checker = ConflictChecker::new(&slots, &booked, DayPolicy::OnePerSlotDate);

        assert!(checker.is_bookable(d("2024-06-03"), Some(2)));
        assert!(checker.is_bookable(d("2024-06-03"), None));
    }

    #[test]
    fn test_per_day_policy_blocks_whole_day() {
        let slots = week();
        let booked = vec![appointment(1, "2024-06-03")];
        let checker = ConflictChecker::new(&slots, &booked, DayPolicy::OnePerConsultantDay);

        assert_eq!(checker.check(d("2024-06-03"), 2), Err(Unbookable::DayTaken));
        assert!(!checker.is_bookable(d("2024-06-03"), None));
        assert!(checker.is_bookable(d("2024-06-05"), Some(3)));
    }

    #[test]
    fn test_window_filter_matches_exact_times() {
        let slots = week();
        let checker = ConflictChecker::new(&slots, &[], DayPolicy::default());
        let morning = slots[0].window();
        let afternoon = slots[1].window();

        // Morning window exists on Monday and Wednesday, afternoon only on Monday.
        assert!(checker.is_bookable_for_window(d("2024-06-05"), &morning));
        assert!(!checker.is_bookable_for_window(d("2024-06-05"), &afternoon));
        assert!(checker.is_bookable_for_window(d("2024-06-03"), &afternoon));
    }

    #[test]
    fn test_bookable_dates_in_range() {
        let slots = week();
        let booked = vec![appointment(1, "2024-06-03")];
        let checker = ConflictChecker::new(&slots, &booked, DayPolicy::OnePerConsultantDay);

        let dates = checker.bookable_dates(d("2024-06-01"), d("2024-06-14"), None);
        assert_eq!(
            dates,
            vec![d("2024-06-05"), d("2024-06-10"), d("2024-06-12")]
        );

        let afternoon = checker.bookable_dates(d("2024-06-01"), d("2024-06-14"), Some(2));
        assert_eq!(afternoon, vec![d("2024-06-10")]);
    }

    #[test]
    fn test_empty_range() {
        let slots = week();
        let checker = ConflictChecker::new(&slots, &[], DayPolicy::default());
        assert!(checker.bookable_dates(d("2024-06-10"), d("2024-06-01"), None).is_empty());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(DayPolicy::parse("per_slot_date"), Some(DayPolicy::OnePerSlotDate));
        assert_eq!(
            DayPolicy::parse("PER_CONSULTANT_DAY"),
            Some(DayPolicy::OnePerConsultantDay)
        );
        assert_eq!(DayPolicy::parse("whatever"), None);
    }
}
