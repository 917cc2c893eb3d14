//! Splices and the layout fixpoint.
//!
//! A splice is a buffer of finished bytecode followed by at most one lazy
//! operator whose encoding depends on label offsets: the label definitions
//! themselves, and the pushes that reference them. The final offset of a
//! label depends on the widths chosen for every push before it, and each
//! width depends on the offsets it references — a mutual recursion resolved
//! here in two phases.
//!
//! Reservation is optimistic: a reference whose target is still unknown is
//! assumed to need a single byte. Offsets only ever move later as widths
//! grow, so reservations are monotone non-decreasing and the expansion loop
//! terminates.

use crate::error::{CompileError, Result};
use etch_data::{minimal_push, IndexVec, Opcode, PushError};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

etch_data::newtype_index! {
    pub(crate) struct SpliceId;
}

/// The deferred part of a splice.
#[derive(Clone, Debug)]
pub(crate) enum LazyOp {
    /// Plain buffer; only the final splice stays untagged.
    None,
    /// Emits the JUMPDEST byte; the name resolves to that byte's offset.
    JumpDest(String),
    /// Emits nothing; the name resolves to the offset of the next byte.
    Label(String),
    /// Pushes one resolved offset.
    PushLabel(String),
    /// Pushes several resolved offsets, each written at the same width.
    PushLabels(Vec<String>),
    /// Pushes the absolute distance between two resolved offsets.
    PushSize(String, String),
}

impl LazyOp {
    /// The label this operator *defines*, if any.
    fn defines(&self) -> Option<&str> {
        match self {
            LazyOp::JumpDest(name) | LazyOp::Label(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Splice {
    pub(crate) buf: Vec<u8>,
    op: LazyOp,
    /// Index of the originating node, for error reporting.
    node: usize,
    /// Resolved byte offset; for JumpDest/Label splices this is what the
    /// name resolves to.
    offset: Option<u32>,
    /// The splices the lazy operator refers to.
    targets: SmallVec<[SpliceId; 2]>,
    /// Bytes set aside for the lazy operator, the PUSH opcode included.
    reserved: u32,
}

impl Splice {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            op: LazyOp::None,
            node: 0,
            offset: None,
            targets: SmallVec::new(),
            reserved: 0,
        }
    }
}

/// The ordered splice arena plus the label table, owned by one compilation.
pub(crate) struct Layout {
    splices: IndexVec<SpliceId, Splice>,
    labels: FxHashMap<String, SpliceId>,
}

impl Layout {
    pub(crate) fn new() -> Self {
        let mut splices = IndexVec::new();
        splices.push(Splice::new());
        Self { splices, labels: FxHashMap::default() }
    }

    fn current(&mut self) -> &mut Splice {
        let last = SpliceId::new(self.splices.len() as u32 - 1);
        &mut self.splices[last]
    }

    /// The buffer new bytecode is appended to.
    pub(crate) fn buf(&mut self) -> &mut Vec<u8> {
        &mut self.current().buf
    }

    /// Closes the current splice with a lazy operator and opens a fresh
    /// one. Must be called for every lazy node the driver encounters.
    pub(crate) fn begin_lazy(&mut self, op: LazyOp, node: usize) -> Result<()> {
        let id = SpliceId::new(self.splices.len() as u32 - 1);
        if let Some(name) = op.defines() {
            if self.labels.contains_key(name) {
                return Err(CompileError::DuplicateLabel { name: name.to_owned() });
            }
            self.labels.insert(name.to_owned(), id);
        }

        let current = &mut self.splices[id];
        current.op = op;
        current.node = node;
        self.splices.push(Splice::new());
        Ok(())
    }

    /// Runs the reserve/expand fixpoint and serializes the result.
    pub(crate) fn finalize(mut self) -> Result<Vec<u8>> {
        self.reserve()?;
        self.expand();
        self.serialize()
    }

    /// Single pass: resolve every referenced name, record a best-case
    /// offset for each label, and reserve optimistic space for each push.
    fn reserve(&mut self) -> Result<()> {
        let last = SpliceId::new(self.splices.len() as u32 - 1);
        let mut pc: u32 = 0;
        for i in 0..self.splices.len() {
            let id = SpliceId::new(i as u32);
            pc += self.splices[id].buf.len() as u32;

            if matches!(self.splices[id].op, LazyOp::JumpDest(_) | LazyOp::Label(_)) {
                self.splices[id].offset = Some(pc);
            } else if matches!(self.splices[id].op, LazyOp::None) {
                if id != last {
                    return Err(CompileError::Internal { site: "untagged splice before the end" });
                }
            } else {
                let targets = resolve(&self.labels, &self.splices[id].op)?;
                self.splices[id].targets = targets;
            }

            let reserve = self.extra_bytes(id);
            self.splices[id].reserved = reserve;
            pc += reserve;
        }
        Ok(())
    }

    /// Grows under-reserved pushes, shifting every later label by the
    /// accumulated growth, until a pass changes nothing. References hold
    /// splice ids rather than raw offsets, so only label offsets need the
    /// shift.
    fn expand(&mut self) {
        let mut passes = 0u32;
        loop {
            let mut grow: u32 = 0;
            for i in 0..self.splices.len() {
                let id = SpliceId::new(i as u32);
                if matches!(self.splices[id].op, LazyOp::JumpDest(_) | LazyOp::Label(_)) {
                    if let Some(offset) = self.splices[id].offset {
                        self.splices[id].offset = Some(offset + grow);
                    }
                } else if !matches!(self.splices[id].op, LazyOp::None) {
                    let need = self.extra_bytes(id);
                    if need > self.splices[id].reserved {
                        grow += need - self.splices[id].reserved;
                        self.splices[id].reserved = need;
                    }
                }
            }
            passes += 1;
            if grow == 0 {
                break;
            }
            trace!(passes, grow, "layout expanded");
        }
    }

    /// Concatenates the splices with their lazy operators in final form.
    fn serialize(&self) -> Result<Vec<u8>> {
        let expected: usize =
            self.splices.iter().map(|sp| sp.buf.len() + sp.reserved as usize).sum();
        let mut code = Vec::with_capacity(expected);

        for sp in self.splices.iter() {
            code.extend_from_slice(&sp.buf);

            match &sp.op {
                LazyOp::None | LazyOp::Label(_) => {}
                LazyOp::JumpDest(_) => code.push(Opcode::JUMPDEST.byte()),
                LazyOp::PushSize(a, b) => {
                    let diff = self.offset_at(sp.targets[0])?.abs_diff(self.offset_at(sp.targets[1])?);
                    if diff > u16::MAX as u32 {
                        return Err(CompileError::SizeOverflow {
                            between: (a.clone(), b.clone()),
                            diff: diff as u64,
                        });
                    }
                    let encoded = minimal_push(&diff.to_be_bytes())
                        .map_err(|_| CompileError::Internal { site: "size push encoding" })?;
                    code.extend_from_slice(&encoded);
                }
                LazyOp::PushLabel(_) | LazyOp::PushLabels(_) => {
                    let width = self.entry_width(&sp.targets) as usize;
                    let mut full = Vec::with_capacity(sp.targets.len() * width);
                    for &t in &sp.targets {
                        let offset = self.offset_at(t)?;
                        full.extend_from_slice(&offset.to_be_bytes()[4 - width..]);
                    }
                    let encoded = minimal_push(&full).map_err(|source| match source {
                        PushError::TooLong { .. } => {
                            CompileError::BadPush { source, node_index: sp.node }
                        }
                        PushError::Empty => CompileError::Internal { site: "empty label push" },
                    })?;
                    code.extend_from_slice(&encoded);
                }
            }
        }

        if code.len() != expected {
            return Err(CompileError::Internal { site: "serialized length" });
        }
        Ok(code)
    }

    /// Bytes the lazy operator needs beyond the buffer, PUSH opcode
    /// included, given what is currently known about the offsets it
    /// references.
    fn extra_bytes(&self, id: SpliceId) -> u32 {
        let sp = &self.splices[id];
        match &sp.op {
            LazyOp::None | LazyOp::Label(_) => 0,
            LazyOp::JumpDest(_) => 1,
            LazyOp::PushSize(..) => {
                match (self.offset_of(sp.targets[0]), self.offset_of(sp.targets[1])) {
                    (Some(a), Some(b)) => match a.abs_diff(b) {
                        0 => 1,
                        d if d < 256 => 2,
                        _ => 3,
                    },
                    // Unknown: assume the smallest outcome, a lone PUSH0.
                    _ => 1,
                }
            }
            LazyOp::PushLabel(_) | LazyOp::PushLabels(_) => {
                let width = self.entry_width(&sp.targets);
                let zeroes = self.leading_zeroes(&sp.targets, width);
                1 + sp.targets.len() as u32 * width - zeroes
            }
        }
    }

    /// One byte per referenced offset until any of them is known to need
    /// two.
    fn entry_width(&self, targets: &[SpliceId]) -> u32 {
        for &t in targets {
            if matches!(self.offset_of(t), Some(offset) if offset >= 256) {
                return 2;
            }
        }
        1
    }

    /// How many leading bytes of the concatenated offsets are provably
    /// zero. An unresolved offset cannot be zero (offset 0 is necessarily
    /// already recorded when anything refers back to it), so it is credited
    /// the optimistic `width - 1` high bytes and ends the run.
    fn leading_zeroes(&self, targets: &[SpliceId], width: u32) -> u32 {
        let mut n = 0;
        for &t in targets {
            match self.offset_of(t) {
                None => return n + (width - 1),
                Some(0) => n += width,
                Some(offset) if offset < 256 => return n + width - 1,
                Some(_) => return n,
            }
        }
        n
    }

    fn offset_of(&self, id: SpliceId) -> Option<u32> {
        self.splices[id].offset
    }

    fn offset_at(&self, id: SpliceId) -> Result<u32> {
        self.offset_of(id).ok_or(CompileError::Internal { site: "unresolved label offset" })
    }
}

fn resolve(
    labels: &FxHashMap<String, SpliceId>,
    op: &LazyOp,
) -> Result<SmallVec<[SpliceId; 2]>> {
    let lookup = |name: &str| {
        labels
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UndefinedLabel { name: name.to_owned() })
    };

    match op {
        LazyOp::PushLabel(name) => Ok(SmallVec::from_iter([lookup(name)?])),
        LazyOp::PushLabels(names) => {
            let mut targets = SmallVec::with_capacity(names.len());
            for name in names {
                targets.push(lookup(name)?);
            }
            Ok(targets)
        }
        LazyOp::PushSize(a, b) => Ok(SmallVec::from_iter([lookup(a)?, lookup(b)?])),
        _ => Err(CompileError::Internal { site: "resolving a non-push operator" }),
    }
}
