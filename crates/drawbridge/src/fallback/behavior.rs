//! Gravity and collision checks.
//!
//! The client is teleported above a 3x3 stone platform and has to fall onto
//! it the way the vanilla client does: each tick it moves by its current
//! vertical velocity, then `dy' = (dy - 0.08) * 0.98`. Right after a teleport
//! the velocity is zero, so the first reported movement is `-0.0784`.

/// Block coordinates of the platform center
pub const PLATFORM_X: i32 = 8;
pub const PLATFORM_Z: i32 = 8;
pub const PLATFORM_Y: i32 = 100;

/// Height the player stands at on the platform
pub const PLATFORM_TOP: f64 = PLATFORM_Y as f64 + 1.0;

/// Spawn column, centered on the platform
pub const SPAWN_X: f64 = PLATFORM_X as f64 + 0.5;
pub const SPAWN_Z: f64 = PLATFORM_Z as f64 + 0.5;

pub const GRAVITY: f64 = 0.08;
pub const DRAG: f64 = 0.98;
pub const TOLERANCE: f64 = 1e-3;

pub fn next_velocity(dy: f64) -> f64 {
    (dy - GRAVITY) * DRAG
}

/// Vertical velocity after `ticks` ticks of free fall from rest
pub fn velocity_after(ticks: u32) -> f64 {
    (0..ticks).fold(0.0, |dy, _| next_velocity(dy))
}

/// Distance covered by the first `ticks` reported movements
pub fn fall_distance(ticks: u32) -> f64 {
    (1..=ticks).map(|tick| -velocity_after(tick)).sum()
}

/// Spawn height that leaves `ticks` full movements above the platform and
/// lands on the one after
pub fn spawn_height(ticks: u32) -> f64 {
    PLATFORM_TOP + fall_distance(ticks) - velocity_after(ticks + 1) / 2.0
}

/// Where the fall check currently stands
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// 1.9+: waiting for the teleport confirmation
    AwaitConfirm,
    /// The first movement must report the spawn point
    AwaitEcho,
    Falling,
    Done,
}

/// Result of feeding one movement to the check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallProgress {
    Pending,
    Passed,
}

#[derive(Debug, Clone)]
pub struct FallCheck {
    phase: Phase,
    teleport_id: i32,
    spawn_y: f64,
    y: f64,
    dy: f64,
    ticks: u32,
    required_ticks: u32,
    gravity: bool,
    collision: bool,
}

impl FallCheck {
    pub fn new(teleport_id: i32, needs_confirm: bool, required_ticks: u32, gravity: bool, collision: bool) -> Self {
        let spawn_y = spawn_height(required_ticks);
        Self {
            phase: if needs_confirm { Phase::AwaitConfirm } else { Phase::AwaitEcho },
            teleport_id,
            spawn_y,
            y: spawn_y,
            dy: 0.0,
            ticks: 0,
            required_ticks,
            gravity,
            collision,
        }
    }

    pub fn spawn_y(&self) -> f64 {
        self.spawn_y
    }

    #[cfg(test)]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn confirm(&mut self, teleport_id: i32) -> Result<(), &'static str> {
        if self.phase != Phase::AwaitConfirm {
            return Err("unexpected teleport confirmation");
        }
        if teleport_id != self.teleport_id {
            return Err("wrong teleport id");
        }
        self.phase = Phase::AwaitEcho;
        Ok(())
    }

    /// A packet carrying only the ground flag
    pub fn ground_flag(&self, on_ground: bool) -> Result<(), &'static str> {
        match self.phase {
            Phase::AwaitConfirm => Err("moved before confirming the teleport"),
            Phase::Falling | Phase::AwaitEcho if on_ground && self.y > PLATFORM_TOP + TOLERANCE => {
                Err("claimed to be on ground while falling")
            }
            _ => Ok(()),
        }
    }

    /// A packet carrying a position
    pub fn movement(&mut self, x: f64, y: f64, z: f64, on_ground: bool) -> Result<FallProgress, &'static str> {
        match self.phase {
            Phase::AwaitConfirm => Err("moved before confirming the teleport"),
            Phase::AwaitEcho => {
                let echoed = (x - SPAWN_X).abs() < TOLERANCE
                    && (y - self.spawn_y).abs() < TOLERANCE
                    && (z - SPAWN_Z).abs() < TOLERANCE;
                if !echoed {
                    return Err("did not acknowledge the teleport position");
                }
                if on_ground {
                    return Err("claimed to be on ground while falling");
                }
                self.phase = Phase::Falling;
                Ok(FallProgress::Pending)
            }
            Phase::Falling => self.fall(y, on_ground),
            Phase::Done => Ok(FallProgress::Passed),
        }
    }

    fn fall(&mut self, y: f64, on_ground: bool) -> Result<FallProgress, &'static str> {
        let predicted_dy = next_velocity(self.dy);
        let predicted_y = self.y + predicted_dy;
        let landing = predicted_y <= PLATFORM_TOP;

        if landing {
            if y < PLATFORM_TOP - TOLERANCE {
                return Err("fell through the platform");
            }
            if self.collision && ((y - PLATFORM_TOP).abs() > TOLERANCE || !on_ground) {
                return Err("did not land on the platform");
            }
            if self.gravity && self.ticks < self.required_ticks {
                return Err("landed too early");
            }
            self.phase = Phase::Done;
            return Ok(FallProgress::Passed);
        }

        if on_ground {
            return Err("claimed to be on ground while falling");
        }
        let dy = y - self.y;
        if self.gravity && (dy - predicted_dy).abs() > TOLERANCE {
            return Err("movement does not follow gravity");
        }
        if !self.gravity && dy > TOLERANCE {
            return Err("moved upwards while falling");
        }

        self.y = y;
        self.dy = if self.gravity { predicted_dy } else { dy };
        self.ticks += 1;

        if !self.collision && self.ticks >= self.required_ticks {
            self.phase = Phase::Done;
            return Ok(FallProgress::Passed);
        }
        Ok(FallProgress::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What a vanilla client reports after the teleport echo
    fn vanilla_fall(check: &FallCheck) -> Vec<(f64, bool)> {
        let mut y = check.spawn_y();
        let mut dy = 0.0;
        let mut reports = Vec::new();
        loop {
            dy = next_velocity(dy);
            if y + dy <= PLATFORM_TOP {
                reports.push((PLATFORM_TOP, true));
                return reports;
            }
            y += dy;
            reports.push((y, false));
        }
    }

    fn run(check: &mut FallCheck, reports: &[(f64, bool)]) -> Result<FallProgress, &'static str> {
        check.movement(SPAWN_X, check.spawn_y(), SPAWN_Z, false)?;
        let mut last = FallProgress::Pending;
        for (y, on_ground) in reports {
            last = check.movement(SPAWN_X, *y, SPAWN_Z, *on_ground)?;
        }
        Ok(last)
    }

    #[test]
    fn test_first_velocity() {
        assert!((velocity_after(1) + 0.0784).abs() < 1e-9);
    }

    #[test]
    fn test_spawn_leaves_required_ticks() {
        let check = FallCheck::new(1, false, 8, true, true);
        let reports = vanilla_fall(&check);
        assert_eq!(reports.len(), 9);
        assert_eq!(reports.last(), Some(&(PLATFORM_TOP, true)));
    }

    #[test]
    fn test_vanilla_fall_passes() {
        let mut check = FallCheck::new(1, false, 8, true, true);
        let reports = vanilla_fall(&check);
        assert_eq!(run(&mut check, &reports), Ok(FallProgress::Passed));
        assert!(check.is_done());
    }

    #[test]
    fn test_constant_velocity_fails() {
        let mut check = FallCheck::new(1, false, 8, true, true);
        let reports: Vec<_> = (1..=9).map(|i| (check.spawn_y() - 0.1 * i as f64, false)).collect();
        assert_eq!(run(&mut check, &reports), Err("movement does not follow gravity"));
    }

    #[test]
    fn test_passing_through_platform_fails() {
        let mut check = FallCheck::new(1, false, 8, true, true);
        let mut reports = vanilla_fall(&check);
        if let Some(last) = reports.last_mut() {
            *last = (PLATFORM_TOP - 0.5, false);
        }
        assert_eq!(run(&mut check, &reports), Err("fell through the platform"));
    }

    #[test]
    fn test_ground_claim_while_airborne_fails() {
        let mut check = FallCheck::new(1, false, 8, true, true);
        check.movement(SPAWN_X, check.spawn_y(), SPAWN_Z, false).unwrap();
        assert!(check.ground_flag(true).is_err());
        assert!(check.ground_flag(false).is_ok());
        let y = check.spawn_y() + velocity_after(1);
        assert!(check.movement(SPAWN_X, y, SPAWN_Z, true).is_err());
    }

    #[test]
    fn test_teleport_must_be_confirmed_first() {
        let mut check = FallCheck::new(42, true, 8, true, true);
        assert!(check.movement(SPAWN_X, check.spawn_y(), SPAWN_Z, false).is_err());

        let mut check = FallCheck::new(42, true, 8, true, true);
        assert_eq!(check.confirm(41), Err("wrong teleport id"));

        let mut check = FallCheck::new(42, true, 8, true, true);
        check.confirm(42).unwrap();
        let reports = vanilla_fall(&check);
        assert_eq!(run(&mut check, &reports), Ok(FallProgress::Passed));
    }

    #[test]
    fn test_echo_must_match_spawn() {
        let mut check = FallCheck::new(1, false, 8, true, true);
        assert!(check.movement(SPAWN_X, check.spawn_y() - 1.0, SPAWN_Z, false).is_err());
    }

    #[test]
    fn test_gravity_only_passes_after_ticks() {
        let mut check = FallCheck::new(1, false, 4, true, false);
        let reports = vanilla_fall(&check);
        // done after four falling reports; the landing is never needed
        assert_eq!(run(&mut check, &reports[..4]), Ok(FallProgress::Passed));
    }

    #[test]
    fn test_collision_only() {
        let mut check = FallCheck::new(1, false, 8, false, true);
        let reports = vanilla_fall(&check);
        assert_eq!(run(&mut check, &reports), Ok(FallProgress::Passed));

        let mut check = FallCheck::new(1, false, 8, false, true);
        let start = check.spawn_y();
        let reports = vec![(start - 1.0, false), (start - 2.0, false), (PLATFORM_TOP - 2.0, false)];
        assert_eq!(run(&mut check, &reports), Err("fell through the platform"));
    }
}
