use crate::model::AttendanceStatus;

impl AttendanceStatus {
    /// Manual toggle order: UNDEFINED -> PRESENT -> ABSENT -> EXCUSED -> UNDEFINED.
    pub fn next(self) -> Self {
        match self {
            AttendanceStatus::Undefined => AttendanceStatus::Present,
            AttendanceStatus::Present => AttendanceStatus::Absent,
            AttendanceStatus::Absent => AttendanceStatus::Excused,
            AttendanceStatus::Excused => AttendanceStatus::Undefined,
        }
    }
}

/// Status a cell should take: the forced target when given, else the next in the ring.
pub fn resolve_next(current: AttendanceStatus, forced: Option<AttendanceStatus>) -> AttendanceStatus {
    forced.unwrap_or_else(|| current.next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttendanceStatus::*;

    #[test]
    fn ring_advances_one_step_per_call() {
        assert_eq!(Undefined.next(), Present);
        assert_eq!(Present.next(), Absent);
        assert_eq!(Absent.next(), Excused);
        assert_eq!(Excused.next(), Undefined);

        let mut s = Undefined;
        for _ in 0..4 {
            s = s.next();
        }
        assert_eq!(s, Undefined);
    }

    #[test]
    fn unknown_codes_advance_to_present() {
        assert_eq!(AttendanceStatus::from_code("late").next(), Present);
    }

    #[test]
    fn forced_target_bypasses_ring() {
        assert_eq!(resolve_next(Present, Some(Excused)), Excused);
        assert_eq!(resolve_next(Present, Some(Present)), Present);
        assert_eq!(resolve_next(Absent, None), Excused);
    }
}
