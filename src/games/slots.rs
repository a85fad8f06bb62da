//! 3x3 weighted-reel slot machine
//!
//! Every cell is an independent draw from a weighted symbol table. Three equal
//! symbols on an active payline pay that symbol's multiplier times the bet per
//! line; the multipliers of all winning lines add up.

use super::types::{settle_round, GameType, RoundReceipt};
use crate::errors::GameError;
use crate::ledger::Ledger;
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pays are stored in tenths so 1.5x stays exact in integer arithmetic.
const PAY_SCALE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Lemon,
    Cherry,
    Star,
    Bell,
    Diamond,
    Seven,
    /// Scatter symbol of the bonus variant, never pays on a line
    Bonus,
}

impl Symbol {
    /// Line symbols in table order, most common first
    pub const LINE_SYMBOLS: [Symbol; 6] = [
        Symbol::Lemon,
        Symbol::Cherry,
        Symbol::Star,
        Symbol::Bell,
        Symbol::Diamond,
        Symbol::Seven,
    ];

    pub fn weight(self) -> u32 {
        match self {
            Symbol::Lemon => 30,
            Symbol::Cherry => 26,
            Symbol::Star => 18,
            Symbol::Bell => 14,
            Symbol::Diamond => 8,
            Symbol::Seven => 4,
            Symbol::Bonus => 6,
        }
    }

    /// Three-of-a-kind multiplier in tenths
    fn pay_tenths(self) -> u64 {
        match self {
            Symbol::Lemon => 15,
            Symbol::Cherry => 20,
            Symbol::Star => 40,
            Symbol::Bell => 60,
            Symbol::Diamond => 100,
            Symbol::Seven => 200,
            Symbol::Bonus => 0,
        }
    }

    pub fn pay(self) -> f64 {
        self.pay_tenths() as f64 / PAY_SCALE as f64
    }

    pub fn icon(self) -> &'static str {
        match self {
            Symbol::Lemon => "🍋",
            Symbol::Cherry => "🍒",
            Symbol::Star => "⭐",
            Symbol::Bell => "🔔",
            Symbol::Diamond => "💎",
            Symbol::Seven => "7️⃣",
            Symbol::Bonus => "🎁",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.icon())
    }
}

/// Weighted symbol table; one uniform integer draw picks a symbol.
#[derive(Debug, Clone)]
pub struct ReelStrip {
    symbols: Vec<Symbol>,
    total_weight: u32,
}

impl ReelStrip {
    pub fn new(symbols: &[Symbol]) -> Self {
        Self {
            symbols: symbols.to_vec(),
            total_weight: symbols.iter().map(|s| s.weight()).sum(),
        }
    }

    pub fn base() -> Self {
        Self::new(&Symbol::LINE_SYMBOLS)
    }

    pub fn with_bonus() -> Self {
        let mut symbols = Symbol::LINE_SYMBOLS.to_vec();
        symbols.push(Symbol::Bonus);
        Self::new(&symbols)
    }

    pub fn total_weight(&self) -> u32 {
        self.total_weight
    }

    pub fn draw<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Symbol {
        let mut index = rng.random_int(0, self.total_weight as i64 - 1) as u32;
        for symbol in &self.symbols {
            if index < symbol.weight() {
                return *symbol;
            }
            index -= symbol.weight();
        }
        // unreachable for a clamped draw; fall back to the most common symbol
        self.symbols.first().copied().unwrap_or(Symbol::Lemon)
    }

    /// Row-major 3x3 grid, nine draws
    pub fn spin_grid<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Grid {
        let mut grid = [[Symbol::Lemon; 3]; 3];
        for row in grid.iter_mut() {
            for cell in row.iter_mut() {
                *cell = self.draw(rng);
            }
        }
        grid
    }
}

/// `grid[row][col]`
pub type Grid = [[Symbol; 3]; 3];

pub type Line = [(usize, usize); 3];

const MIDDLE_ROW: Line = [(1, 0), (1, 1), (1, 2)];

const FIVE_LINES: [Line; 5] = [
    [(0, 0), (0, 1), (0, 2)],
    MIDDLE_ROW,
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Paylines {
    One,
    Five,
}

impl Paylines {
    pub fn count(self) -> u64 {
        match self {
            Paylines::One => 1,
            Paylines::Five => 5,
        }
    }

    pub fn lines(self) -> &'static [Line] {
        match self {
            Paylines::One => std::slice::from_ref(&MIDDLE_ROW),
            Paylines::Five => &FIVE_LINES,
        }
    }
}

impl TryFrom<u32> for Paylines {
    type Error = GameError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Paylines::One),
            5 => Ok(Paylines::Five),
            other => Err(GameError::InvalidBet(format!(
                "line count must be 1 or 5, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineWin {
    pub line: Line,
    pub symbol: Symbol,
}

/// Winning lines of a grid and their summed multiplier in tenths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub wins: Vec<LineWin>,
    multiplier_tenths: u64,
}

impl Evaluation {
    pub fn multiplier(&self) -> f64 {
        self.multiplier_tenths as f64 / PAY_SCALE as f64
    }

    /// `floor(bet_per_line x multiplier)`
    pub fn win_for(&self, bet_per_line: u64) -> u64 {
        bet_per_line.saturating_mul(self.multiplier_tenths) / PAY_SCALE
    }
}

pub fn evaluate(grid: &Grid, paylines: Paylines) -> Evaluation {
    let mut evaluation = Evaluation::default();
    for line in paylines.lines() {
        let [a, b, c] = line.map(|(r, col)| grid[r][col]);
        if a == b && b == c && a.pay_tenths() > 0 {
            evaluation.multiplier_tenths += a.pay_tenths();
            evaluation.wins.push(LineWin { line: *line, symbol: a });
        }
    }
    evaluation
}

pub fn count_bonus(grid: &Grid) -> usize {
    grid.iter().flatten().filter(|s| **s == Symbol::Bonus).count()
}

/// Free-spin rules of the bonus variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusRules {
    /// Free spins for exactly two scatters on a paid spin
    pub spins_for_two: u32,
    /// Free spins for three or more scatters on a paid spin
    pub spins_for_three: u32,
    /// Extra spins when a free spin lands two or more scatters
    pub retrigger_spins: u32,
    /// Line wins during free spins are multiplied by this
    pub win_multiplier: u64,
    /// Upper bound on spins awarded in one sequence
    pub max_spins: u32,
}

impl Default for BonusRules {
    fn default() -> Self {
        Self {
            spins_for_two: 5,
            spins_for_three: 10,
            retrigger_spins: 3,
            win_multiplier: 2,
            max_spins: 50,
        }
    }
}

impl BonusRules {
    pub fn spins_awarded(&self, scatters: usize) -> u32 {
        match scatters {
            0 | 1 => 0,
            2 => self.spins_for_two,
            _ => self.spins_for_three,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeSpin {
    pub grid: Grid,
    pub wins: Vec<LineWin>,
    pub win: u64,
    pub retriggered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinOutcome {
    pub grid: Grid,
    pub paylines: Paylines,
    pub bet_per_line: u64,
    pub wins: Vec<LineWin>,
    pub multiplier: f64,
    /// Line win of the paid spin alone
    pub win: u64,
    pub free_spins: Vec<FreeSpin>,
    pub receipt: RoundReceipt,
}

impl SpinOutcome {
    pub fn total_win(&self) -> u64 {
        self.receipt.payout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutospinStop {
    Completed,
    InsufficientFunds,
}

#[derive(Debug, Clone)]
pub struct AutospinReport {
    pub spins: Vec<SpinOutcome>,
    pub stopped: AutospinStop,
}

impl AutospinReport {
    pub fn total_staked(&self) -> u64 {
        self.spins.iter().map(|s| s.receipt.stake).sum()
    }

    pub fn total_won(&self) -> u64 {
        self.spins.iter().map(|s| s.receipt.payout).sum()
    }
}

/// Per-session slot controller
#[derive(Debug, Clone)]
pub struct SlotMachine {
    min_line_bet: u64,
    strip: ReelStrip,
    bonus: Option<BonusRules>,
    last_grid: Option<Grid>,
}

impl SlotMachine {
    pub fn new(min_line_bet: u64) -> Self {
        Self {
            min_line_bet: min_line_bet.max(1),
            strip: ReelStrip::base(),
            bonus: None,
            last_grid: None,
        }
    }

    /// Enable the scatter symbol and free spins
    pub fn with_bonus(mut self, rules: BonusRules) -> Self {
        self.strip = ReelStrip::with_bonus();
        self.bonus = Some(rules);
        self
    }

    pub fn bonus_rules(&self) -> Option<&BonusRules> {
        self.bonus.as_ref()
    }

    pub fn min_line_bet(&self) -> u64 {
        self.min_line_bet
    }

    pub fn last_grid(&self) -> Option<&Grid> {
        self.last_grid.as_ref()
    }

    /// Bet per line after clamping up to the table minimum
    pub fn line_bet(&self, requested: u64) -> u64 {
        requested.max(self.min_line_bet)
    }

    pub fn total_bet(&self, requested: u64, paylines: Paylines) -> u64 {
        self.line_bet(requested).saturating_mul(paylines.count())
    }

    /// One paid spin, including any free spins it triggers
    pub fn spin<R: RandomSource + ?Sized>(
        &mut self,
        ledger: &Ledger,
        profile: &str,
        bet_per_line: u64,
        lines: u32,
        rng: &mut R,
    ) -> Result<SpinOutcome, GameError> {
        let paylines = Paylines::try_from(lines)?;
        let bet_per_line = self.line_bet(bet_per_line);
        let total_bet = bet_per_line.saturating_mul(paylines.count());
        let stake = i64::try_from(total_bet)
            .map_err(|_| GameError::InvalidBet(format!("bet {} is too large", total_bet)))?;
        ledger.place_bet(profile, stake)?;

        let grid = self.strip.spin_grid(rng);
        let evaluation = evaluate(&grid, paylines);
        let win = evaluation.win_for(bet_per_line);
        let multiplier = evaluation.multiplier();

        let free_spins = match self.bonus {
            Some(rules) => {
                let awarded = rules.spins_awarded(count_bonus(&grid));
                self.play_free_spins(&rules, awarded, bet_per_line, paylines, rng)
            }
            None => Vec::new(),
        };
        self.last_grid = Some(free_spins.last().map(|f| f.grid).unwrap_or(grid));

        let payout = free_spins.iter().fold(win, |acc, f| acc.saturating_add(f.win));
        let receipt = settle_round(ledger, profile, GameType::Slots, total_bet, payout)?;

        Ok(SpinOutcome {
            grid,
            paylines,
            bet_per_line,
            wins: evaluation.wins,
            multiplier,
            win,
            free_spins,
            receipt,
        })
    }

    fn play_free_spins<R: RandomSource + ?Sized>(
        &self,
        rules: &BonusRules,
        awarded: u32,
        bet_per_line: u64,
        paylines: Paylines,
        rng: &mut R,
    ) -> Vec<FreeSpin> {
        let mut granted = awarded.min(rules.max_spins);
        let mut played = Vec::with_capacity(granted as usize);

        while (played.len() as u32) < granted {
            let grid = self.strip.spin_grid(rng);
            let evaluation = evaluate(&grid, paylines);
            let win = evaluation
                .win_for(bet_per_line)
                .saturating_mul(rules.win_multiplier);

            let retriggered = count_bonus(&grid) >= 2 && granted < rules.max_spins;
            if retriggered {
                granted = (granted + rules.retrigger_spins).min(rules.max_spins);
            }

            played.push(FreeSpin {
                grid,
                wins: evaluation.wins,
                win,
                retriggered,
            });
        }

        if !played.is_empty() {
            tracing::debug!(spins = played.len(), "Free spin sequence finished");
        }
        played
    }

    /// Up to `count` paid spins; stops early once the balance cannot cover
    /// the next total bet.
    pub fn autospin<R: RandomSource + ?Sized>(
        &mut self,
        ledger: &Ledger,
        profile: &str,
        bet_per_line: u64,
        lines: u32,
        count: u32,
        rng: &mut R,
    ) -> Result<AutospinReport, GameError> {
        let paylines = Paylines::try_from(lines)?;
        let total_bet = self.total_bet(bet_per_line, paylines);
        let mut spins = Vec::new();

        for _ in 0..count {
            if ledger.get_balance(profile)? < total_bet {
                tracing::info!(profile, spins = spins.len(), "Autospin stopped: insufficient funds");
                return Ok(AutospinReport {
                    spins,
                    stopped: AutospinStop::InsufficientFunds,
                });
            }
            match self.spin(ledger, profile, bet_per_line, lines, rng) {
                Ok(outcome) => spins.push(outcome),
                // another caller drained the wallet between check and debit
                Err(e) if e.is_insufficient_funds() => {
                    return Ok(AutospinReport {
                        spins,
                        stopped: AutospinStop::InsufficientFunds,
                    })
                }
                Err(e) => return Err(e),
            }
        }

        Ok(AutospinReport {
            spins,
            stopped: AutospinStop::Completed,
        })
    }
}
