use crate::availability::AvailabilityIndex;
use crate::conflict::{TeacherOccupancy, would_conflict};
use crate::data::{
    CELLS_PER_WEEK, Cell, CellSet, ClassSubject, DAYS_PER_WEEK, ScheduleSlot, UnmetSubject,
};
use crate::error::SchedulingError;
use log::{info, trace, warn};
use std::cmp::Reverse;
use std::time::Instant;

/// Search bounds for the timetable solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    /// Backtracks allowed per required weekly hour.
    pub backtracks_per_hour: usize,
    /// Lower bound on the backtrack budget, for small curricula.
    pub min_backtracks: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backtracks_per_hour: 256,
            min_backtracks: 1_000,
        }
    }
}

impl SolverConfig {
    pub fn backtrack_limit(&self, total_hours: u32) -> usize {
        self.backtracks_per_hour
            .saturating_mul(total_hours as usize)
            .max(self.min_backtracks)
    }
}

/// Everything the solver reads. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    pub class_id: &'a str,
    pub subjects: &'a [ClassSubject],
    pub availability: &'a AvailabilityIndex,
    /// Teacher occupancy of every other class.
    pub committed: &'a TeacherOccupancy,
}

/// The solver's answer: rows for every placed hour, and what could not be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutcome {
    /// Sorted by (day, slot).
    pub rows: Vec<ScheduleSlot>,
    pub unmet: Vec<UnmetSubject>,
    pub backtracks: usize,
    /// The backtrack budget ran out before the search finished.
    pub exhausted: bool,
}

impl SolveOutcome {
    pub fn is_complete(&self) -> bool {
        self.unmet.is_empty()
    }

    /// Complete rows, or the unmet subjects. Partial rows are dropped.
    pub fn into_result(self) -> Result<Vec<ScheduleSlot>, SchedulingError> {
        if self.unmet.is_empty() {
            Ok(self.rows)
        } else {
            Err(SchedulingError {
                unmet_subjects: self.unmet,
            })
        }
    }
}

/// Solves one class's timetable by most-constrained-first backtracking with
/// forward checking.
///
/// Within one class every cell holds at most one subject, so the open hours
/// fit together exactly when a matching of hours to their eligible cells
/// covers them all. The forward check runs that matching after every
/// placement, which keeps the search from walking into dead ends, and an
/// incomplete result places as many hours as can be placed at all.
pub fn solve(request: &SolveRequest<'_>, config: &SolverConfig) -> SolveOutcome {
    let start_time = Instant::now();
    let total_hours: u32 = request.subjects.iter().map(|s| s.hours_weekly).sum();
    let limit = config.backtrack_limit(total_hours);
    info!(
        "Solving class {} with {} subjects, {} required hours and a budget of {} backtracks...",
        request.class_id,
        request.subjects.len(),
        total_hours,
        limit
    );

    let mut search = Search::new(request, limit);
    let solved = search.forward_check() && search.search();
    if !solved {
        search.settle_best_effort();
    }
    let outcome = search.into_outcome(request.class_id);

    info!(
        "Class {} solved in {:.2?}: {} rows, {} unmet subjects, {} backtracks{}",
        request.class_id,
        start_time.elapsed(),
        outcome.rows.len(),
        outcome.unmet.len(),
        outcome.backtracks,
        if outcome.exhausted {
            " (budget exhausted)"
        } else {
            ""
        }
    );
    outcome
}

// One subject as a search variable.
struct Variable<'a> {
    subject: &'a ClassSubject,
    teacher: Option<&'a str>,
    // availability minus cells other classes already hold
    allowed: CellSet,
    // hours the search tries to place; below hours_weekly when the
    // initial domain is too small
    target: usize,
}

struct Search<'a> {
    vars: Vec<Variable<'a>>,
    committed: &'a TeacherOccupancy,
    tentative: TeacherOccupancy,
    class_grid: CellSet,
    placed: Vec<CellSet>,
    excluded: Vec<CellSet>,
    trail: Vec<(usize, Cell)>,
    backtracks: usize,
    limit: usize,
    exhausted: bool,
}

impl<'a> Search<'a> {
    fn new(request: &SolveRequest<'a>, limit: usize) -> Self {
        let empty = TeacherOccupancy::new();
        let mut subjects: Vec<&ClassSubject> = request.subjects.iter().collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let vars: Vec<Variable<'a>> = subjects
            .into_iter()
            .map(|subject| {
                let teacher = subject.teacher_id.as_deref();
                let allowed: CellSet = Cell::all()
                    .filter(|cell| match teacher {
                        Some(t) => request.availability.is_available_at(t, *cell),
                        None => true,
                    })
                    .filter(|cell| !would_conflict(teacher, *cell, request.committed, &empty))
                    .collect();
                let hours = subject.hours_weekly as usize;
                if allowed.len() < hours {
                    warn!(
                        "Subject {} ({}) needs {} hours but only {} cells are open to it",
                        subject.name,
                        subject.id,
                        hours,
                        allowed.len()
                    );
                }
                Variable {
                    subject,
                    teacher,
                    allowed,
                    target: hours.min(allowed.len()),
                }
            })
            .collect();

        let n = vars.len();
        Self {
            vars,
            committed: request.committed,
            tentative: TeacherOccupancy::new(),
            class_grid: CellSet::empty(),
            placed: vec![CellSet::empty(); n],
            excluded: vec![CellSet::empty(); n],
            trail: Vec::new(),
            backtracks: 0,
            limit,
            exhausted: false,
        }
    }

    fn remaining(&self, var: usize) -> usize {
        self.vars[var].target - self.placed[var].len()
    }

    // Cells still eligible for `var` at this point in the search.
    fn domain(&self, var: usize) -> CellSet {
        let v = &self.vars[var];
        v.allowed
            .difference(self.class_grid)
            .difference(self.excluded[var])
            .iter()
            .filter(|cell| !would_conflict(v.teacher, *cell, self.committed, &self.tentative))
            .collect()
    }

    // Open hours and current domains, indexed like `vars`.
    fn residual(&self) -> (Vec<usize>, Vec<CellSet>) {
        (0..self.vars.len())
            .map(|v| match self.remaining(v) {
                0 => (0, CellSet::empty()),
                open => (open, self.domain(v)),
            })
            .unzip()
    }

    fn forward_check(&self) -> bool {
        let (demand, domains) = self.residual();
        if demand
            .iter()
            .zip(&domains)
            .any(|(&open, domain)| domain.len() < open)
        {
            return false;
        }
        let matched: usize = max_matching(&demand, &domains).iter().map(Vec::len).sum();
        matched == demand.iter().sum::<usize>()
    }

    // Smallest domain first; ties go to more weekly hours, then name.
    fn priority(&self, var: usize, domain: CellSet) -> (usize, Reverse<u32>, &str, &str) {
        let subject = self.vars[var].subject;
        (
            domain.len(),
            Reverse(subject.hours_weekly),
            subject.name.as_str(),
            subject.id.as_str(),
        )
    }

    fn select_variable(&self) -> Option<(usize, CellSet)> {
        (0..self.vars.len())
            .filter(|&v| self.remaining(v) > 0)
            .map(|v| (v, self.domain(v)))
            .min_by_key(|(v, domain)| self.priority(*v, *domain))
    }

    // Cells that the fewest other open subjects could still use come first.
    // Ties prefer days where the subject has fewer hours so far.
    fn order_candidates(&self, var: usize, domain: CellSet) -> Vec<Cell> {
        let others: Vec<CellSet> = (0..self.vars.len())
            .filter(|&v| v != var && self.remaining(v) > 0)
            .map(|v| self.domain(v))
            .collect();
        let mut per_day = [0usize; DAYS_PER_WEEK];
        for cell in self.placed[var].iter() {
            per_day[cell.day.index()] += 1;
        }

        let mut candidates: Vec<Cell> = domain.iter().collect();
        candidates.sort_by_key(|cell| {
            let disruption = others.iter().filter(|d| d.contains(*cell)).count();
            (disruption, per_day[cell.day.index()], cell.index())
        });
        candidates
    }

    fn place(&mut self, var: usize, cell: Cell) {
        self.class_grid.insert(cell);
        self.placed[var].insert(cell);
        if let Some(teacher) = self.vars[var].teacher {
            self.tentative.occupy(teacher, cell);
        }
        self.trail.push((var, cell));
    }

    fn unplace(&mut self, var: usize, cell: Cell) {
        self.class_grid.remove(cell);
        self.placed[var].remove(cell);
        if let Some(teacher) = self.vars[var].teacher {
            self.tentative.release(teacher, cell);
        }
        self.trail.pop();
    }

    // After a failed search: place a largest set of hours that fit together.
    fn settle_best_effort(&mut self) {
        let (demand, domains) = self.residual();
        for (var, cells) in max_matching(&demand, &domains).into_iter().enumerate() {
            for cell in cells {
                self.place(var, cell);
            }
        }
        trace!("Best effort kept {} placements", self.trail.len());
    }

    fn search(&mut self) -> bool {
        let Some((var, domain)) = self.select_variable() else {
            return true;
        };
        let needed = self.remaining(var);
        if domain.len() < needed {
            return false;
        }

        let candidates = self.order_candidates(var, domain);
        let mut rejected = Vec::new();
        let mut solved = false;
        for cell in &candidates {
            if self.exhausted || candidates.len() - rejected.len() < needed {
                break;
            }
            self.place(var, *cell);
            if self.forward_check() && self.search() {
                solved = true;
                break;
            }
            self.unplace(var, *cell);

            // Every completion with `var` at `cell` from this state has been
            // tried, so sibling branches may skip it.
            self.excluded[var].insert(*cell);
            rejected.push(*cell);
            self.backtracks += 1;
            if self.backtracks >= self.limit {
                self.exhausted = true;
            }
        }
        for cell in rejected {
            self.excluded[var].remove(cell);
        }
        solved
    }

    fn into_outcome(self, class_id: &str) -> SolveOutcome {
        let mut placed_hours = vec![0u32; self.vars.len()];
        let mut rows: Vec<ScheduleSlot> = self
            .trail
            .iter()
            .map(|&(var, cell)| {
                placed_hours[var] += 1;
                ScheduleSlot::new(class_id, self.vars[var].subject, cell)
            })
            .collect();
        rows.sort_by(|a, b| {
            a.cell()
                .cmp(&b.cell())
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });

        let unmet = self
            .vars
            .iter()
            .zip(placed_hours)
            .filter(|(v, placed)| *placed < v.subject.hours_weekly)
            .map(|(v, placed)| UnmetSubject {
                subject_id: v.subject.id.clone(),
                subject_name: v.subject.name.clone(),
                missing_hours: v.subject.hours_weekly - placed,
            })
            .collect();

        SolveOutcome {
            rows,
            unmet,
            backtracks: self.backtracks,
            exhausted: self.exhausted,
        }
    }
}

/// Assigns up to `demand[v]` distinct cells from `domains[v]` to each variable,
/// maximizing the total, by augmenting paths. No cell is given out twice.
fn max_matching(demand: &[usize], domains: &[CellSet]) -> Vec<Vec<Cell>> {
    let mut owner: [Option<usize>; CELLS_PER_WEEK] = [None; CELLS_PER_WEEK];
    for (var, &hours) in demand.iter().enumerate() {
        for _ in 0..hours {
            let mut visited = CellSet::empty();
            if !augment(var, domains, &mut owner, &mut visited) {
                // Every further hour of `var` would fail the same way.
                break;
            }
        }
    }

    let mut matched = vec![Vec::new(); demand.len()];
    for cell in Cell::all() {
        if let Some(var) = owner[cell.index()] {
            matched[var].push(cell);
        }
    }
    matched
}

fn augment(
    var: usize,
    domains: &[CellSet],
    owner: &mut [Option<usize>; CELLS_PER_WEEK],
    visited: &mut CellSet,
) -> bool {
    for cell in domains[var].iter() {
        if !visited.insert(cell) {
            continue;
        }
        let free = match owner[cell.index()] {
            None => true,
            Some(holder) => augment(holder, domains, owner, visited),
        };
        if free {
            owner[cell.index()] = Some(var);
            return true;
        }
    }
    false
}
