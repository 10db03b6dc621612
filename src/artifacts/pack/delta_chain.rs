//! Delta chain resolution
//!
//! Building walks backward from a delta to the first plain object, one base
//! at a time, in an explicit loop so chain depth never grows the call stack,
//! even when the chain hops between packs.
//! Resolving replays the collected scripts forward, base first. Each step
//! needs the fully materialized output of the previous one, so a single
//! chain is strictly sequential; independent chains share no state and can
//! be resolved in parallel.

use crate::areas::pack::Pack;
use crate::artifacts::database::object_locator::ObjectLocator;
use crate::artifacts::objects::object::{Object, RawObject};
use crate::artifacts::objects::pack_object::{Delta, DeltaBase, PackObject};
use crate::artifacts::pack::delta::apply_delta;
use crate::artifacts::pack::limits::DeltaLimits;
use crate::error::{ChainLink, PackError, PackResult};
use tracing::trace;

/// Where a chain looks for the bases of its deltas
///
/// Hash bases are looked up in every pack of `packs`, the pack holding the
/// current delta first, and only then in `fallback`. A base found in a pack
/// comes back unresolved, for the chain builder to follow.
#[derive(Clone, Copy)]
pub struct BaseSource<'a> {
    packs: &'a [Pack],
    fallback: &'a dyn ObjectLocator,
}

impl<'a> BaseSource<'a> {
    pub fn new(packs: &'a [Pack], fallback: &'a dyn ObjectLocator) -> Self {
        BaseSource { packs, fallback }
    }

    /// Only `pack` itself, then `fallback`
    pub fn single(pack: &'a Pack, fallback: &'a dyn ObjectLocator) -> Self {
        Self::new(std::slice::from_ref(pack), fallback)
    }

    /// Open `base` as seen from a delta stored in `home`
    ///
    /// Returns the record together with the pack it came from; a plain
    /// object from the fallback keeps `home`, as it has no bases to follow.
    fn open(&self, home: &'a Pack, base: &DeltaBase) -> PackResult<(&'a Pack, PackObject)> {
        let oid = match base {
            DeltaBase::Offset(offset) => return Ok((home, home.file().open_object(*offset)?)),
            DeltaBase::Hash(oid) => oid,
        };

        let others = self.packs.iter().filter(|pack| !std::ptr::eq(*pack, home));
        for pack in std::iter::once(home).chain(others) {
            match pack.index().find_offset(oid) {
                Ok(offset) => return Ok((pack, pack.file().open_object(offset)?)),
                Err(PackError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        self.fallback
            .locate(oid)?
            .map(|object| (home, PackObject::Plain(object)))
            .ok_or(PackError::NotFound(*oid))
    }
}

/// Deltas ordered closest-to-target first, ending at a plain base
#[derive(Debug, Clone)]
pub struct DeltaChain {
    deltas: Vec<Delta>,
    base: RawObject,
}

impl DeltaChain {
    /// Follow base references from `delta`, stored in `home`, until a plain
    /// object is reached
    ///
    /// Offset bases are read from the pack holding the delta that names
    /// them. Every link counts against `limits`, whichever pack it is in.
    pub fn build<'a>(
        home: &'a Pack,
        delta: Delta,
        bases: BaseSource<'a>,
        limits: DeltaLimits,
    ) -> PackResult<Self> {
        let mut deltas = Vec::new();
        let mut next = delta;
        let mut pack = home;

        loop {
            if deltas.len() >= limits.max_chain_depth {
                return Err(PackError::ChainTooDeep {
                    limit: limits.max_chain_depth,
                });
            }

            let base_ref = *next.base();
            trace!(offset = next.offset(), base = ?base_ref, depth = deltas.len(), "following delta base");
            let (holder, base) = bases.open(pack, &base_ref).map_err(|err| match base_ref {
                DeltaBase::Offset(offset) => err.at(ChainLink::Offset(offset)),
                DeltaBase::Hash(oid) => err.at(ChainLink::Id(oid)),
            })?;
            deltas.push(next);
            pack = holder;

            match base {
                PackObject::Plain(base) => return Ok(DeltaChain { deltas, base }),
                PackObject::Delta(delta) => next = delta,
            }
        }
    }

    /// Number of delta links
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    pub fn base(&self) -> &RawObject {
        &self.base
    }

    /// Replay every script from the base forward
    ///
    /// The result carries the base's type and must be exactly as long as
    /// the target delta declares.
    pub fn resolve(self) -> PackResult<RawObject> {
        let object_type = self.base.object_type();
        let expected = self.deltas.first().map(Delta::size);
        let mut current = self.base.into_content();

        for delta in self.deltas.iter().rev() {
            trace!(offset = delta.offset(), source = current.len(), target = delta.size(), "applying delta");
            current = apply_delta(&current, delta.script())?;
        }

        if let Some(expected) = expected
            && current.len() as u64 != expected
        {
            return Err(PackError::DeltaSizeMismatch {
                expected,
                actual: current.len() as u64,
            });
        }

        Ok(RawObject::new(object_type, current))
    }
}
