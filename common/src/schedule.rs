use chrono::NaiveTime;

/// Time-of-day window check for scheduled channels.
///
/// `on <= off` is a same-day window `[on, off)`. `on > off` wraps midnight:
/// the channel is on from `on` until `off` the next day. `on == off`
/// degenerates to always-off.
pub fn is_scheduled_on(now: NaiveTime, on: NaiveTime, off: NaiveTime) -> bool {
    if on <= off {
        on <= now && now < off
    } else {
        now >= on || now < off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn same_day_window() {
        let on = at(6, 0);
        let off = at(22, 0);

        assert!(is_scheduled_on(at(12, 0), on, off));
        assert!(is_scheduled_on(at(6, 0), on, off));
        assert!(!is_scheduled_on(at(22, 0), on, off));
        assert!(!is_scheduled_on(at(23, 0), on, off));
        assert!(!is_scheduled_on(at(5, 59), on, off));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let on = at(20, 0);
        let off = at(8, 0);

        assert!(is_scheduled_on(at(23, 0), on, off));
        assert!(is_scheduled_on(at(5, 0), on, off));
        assert!(is_scheduled_on(at(20, 0), on, off));
        assert!(!is_scheduled_on(at(12, 0), on, off));
        assert!(!is_scheduled_on(at(8, 0), on, off));
    }

    #[test]
    fn equal_bounds_are_always_off() {
        let bound = at(9, 30);
        assert!(!is_scheduled_on(at(9, 30), bound, bound));
        assert!(!is_scheduled_on(at(0, 0), bound, bound));
        assert!(!is_scheduled_on(at(23, 59), bound, bound));
    }
}
