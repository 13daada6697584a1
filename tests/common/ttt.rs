//! Tiered tic-tac-toe: tier = number of pieces on the board, position =
//! base-3 encoding of the cells. The hash space is the full 3^9 for every
//! tier; `is_legal_position` rejects boards whose piece counts do not match
//! the tier. Canonical positions fold the 8 board symmetries.

use tiersolve::{Game, Move, Position, Tier, TierPosition, TierType, Value};

const EMPTY: u8 = 0;
const X: u8 = 1;
const O: u8 = 2;

/// 3^9 boards per tier.
pub const BOARD_SPACE: i64 = 19683;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// The dihedral group of the board: `image[i] = board[SYMMETRIES[s][i]]`.
const SYMMETRIES: [[usize; 9]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8],
    [2, 5, 8, 1, 4, 7, 0, 3, 6],
    [8, 7, 6, 5, 4, 3, 2, 1, 0],
    [6, 3, 0, 7, 4, 1, 8, 5, 2],
    [2, 1, 0, 5, 4, 3, 8, 7, 6],
    [0, 3, 6, 1, 4, 7, 2, 5, 8],
    [6, 7, 8, 3, 4, 5, 0, 1, 2],
    [8, 5, 2, 7, 4, 1, 6, 3, 0],
];

type Board = [u8; 9];

fn unhash(position: Position) -> Board {
    let mut board = [EMPTY; 9];
    let mut rest = position;
    for cell in &mut board {
        *cell = (rest % 3) as u8;
        rest /= 3;
    }
    board
}

fn hash(board: &Board) -> Position {
    board
        .iter()
        .rev()
        .fold(0, |acc, &cell| acc * 3 + cell as Position)
}

fn counts(board: &Board) -> (u32, u32) {
    let x = board.iter().filter(|&&c| c == X).count() as u32;
    let o = board.iter().filter(|&&c| c == O).count() as u32;
    (x, o)
}

fn whose_turn(board: &Board) -> u8 {
    let (x, o) = counts(board);
    if x == o {
        X
    } else {
        O
    }
}

fn line_winner(board: &Board) -> Option<u8> {
    for line in &LINES {
        let piece = board[line[0]];
        if piece != EMPTY && piece == board[line[1]] && piece == board[line[2]] {
            return Some(piece);
        }
    }
    None
}

fn apply_symmetry(board: &Board, symmetry: usize) -> Board {
    let mut image = [EMPTY; 9];
    for i in 0..9 {
        image[i] = board[SYMMETRIES[symmetry][i]];
    }
    image
}

fn canonical_hash(board: &Board) -> Position {
    (0..SYMMETRIES.len())
        .map(|s| hash(&apply_symmetry(board, s)))
        .min()
        .unwrap()
}

fn legal_board(board: &Board, tier: Tier) -> bool {
    let (x, o) = counts(board);
    if (x + o) as Tier != tier {
        return false;
    }
    if x != o && x != o + 1 {
        return false;
    }
    let mut x_won = false;
    let mut o_won = false;
    for line in &LINES {
        let piece = board[line[0]];
        if piece != EMPTY && piece == board[line[1]] && piece == board[line[2]] {
            x_won |= piece == X;
            o_won |= piece == O;
        }
    }
    if x_won && o_won {
        return false;
    }
    if x_won && x != o + 1 {
        return false;
    }
    if o_won && x != o {
        return false;
    }
    true
}

/// Tic-tac-toe split into ten tiers by piece count.
pub struct TttGame {
    provides_parents: bool,
    declared_type: TierType,
}

impl TttGame {
    /// Plain variant: no analytic parents (the solver builds a reverse
    /// graph), tiers declared loopy (backward induction).
    pub fn new() -> Self {
        Self {
            provides_parents: false,
            declared_type: TierType::Loopy,
        }
    }

    /// Supplies `canonical_parent_positions` analytically.
    pub fn with_parents(mut self) -> Self {
        self.provides_parents = true;
        self
    }

    /// Declares every tier immediate-transition (true for this game), which
    /// routes solving through value iteration.
    pub fn with_immediate_transition(mut self) -> Self {
        self.declared_type = TierType::ImmediateTransition;
        self
    }

    /// Hash of the board with a single X at `cell`, canonicalized.
    pub fn canonical_single_x(cell: usize) -> Position {
        let mut board = [EMPTY; 9];
        board[cell] = X;
        canonical_hash(&board)
    }
}

impl Game for TttGame {
    fn initial_tier(&self) -> Tier {
        0
    }

    fn initial_position(&self) -> Position {
        0
    }

    fn tier_size(&self, _tier: Tier) -> i64 {
        BOARD_SPACE
    }

    fn generate_moves(&self, tier_position: TierPosition) -> Vec<Move> {
        let board = unhash(tier_position.position);
        (0..9)
            .filter(|&cell| board[cell] == EMPTY)
            .map(|cell| cell as Move)
            .collect()
    }

    fn primitive(&self, tier_position: TierPosition) -> Value {
        let board = unhash(tier_position.position);
        // Any completed line belongs to the previous mover (legality forbids
        // the rest), so the player to move has lost.
        if line_winner(&board).is_some() {
            return Value::Lose;
        }
        if board.iter().all(|&c| c != EMPTY) {
            return Value::Tie;
        }
        Value::Undecided
    }

    fn do_move(&self, tier_position: TierPosition, mv: Move) -> TierPosition {
        let mut board = unhash(tier_position.position);
        board[mv as usize] = whose_turn(&board);
        TierPosition::new(tier_position.tier + 1, hash(&board))
    }

    fn is_legal_position(&self, tier_position: TierPosition) -> bool {
        legal_board(&unhash(tier_position.position), tier_position.tier)
    }

    fn child_tiers(&self, tier: Tier) -> Vec<Tier> {
        if tier < 9 {
            vec![tier + 1]
        } else {
            Vec::new()
        }
    }

    fn canonical_position(&self, tier_position: TierPosition) -> Position {
        canonical_hash(&unhash(tier_position.position))
    }

    fn provides_parent_positions(&self) -> bool {
        self.provides_parents
    }

    /// All canonical boards in `parent_tier` with a move into the symmetry
    /// class of `child`: remove one previous-mover piece from each symmetric
    /// image of the child board.
    fn canonical_parent_positions(&self, child: TierPosition, parent_tier: Tier) -> Vec<Position> {
        if parent_tier + 1 != child.tier {
            return Vec::new();
        }
        let board = unhash(child.position);
        let prev_turn = if whose_turn(&board) == X { O } else { X };
        let mut parents = Vec::new();
        for symmetry in 0..SYMMETRIES.len() {
            let image = apply_symmetry(&board, symmetry);
            for cell in 0..9 {
                if image[cell] != prev_turn {
                    continue;
                }
                let mut parent = image;
                parent[cell] = EMPTY;
                if !legal_board(&parent, parent_tier) {
                    continue;
                }
                let canonical = canonical_hash(&parent);
                if !parents.contains(&canonical) {
                    parents.push(canonical);
                }
            }
        }
        parents
    }

    fn tier_type(&self, _tier: Tier) -> TierType {
        self.declared_type
    }

    fn tier_name(&self, tier: Tier) -> String {
        format!("pieces_{tier}")
    }
}
