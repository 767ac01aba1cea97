//! A Merkle tree that accepts leaves one at a time.

use super::Standard;
use blockstream_cryptography::Hasher as CHasher;

/// Prefix-free digest returned as the root of a tree with no leaves.
const EMPTY_PREIMAGE: [u8; 1] = [0x00];

/// An append-only Merkle tree that retains only the roots of its perfect subtrees.
///
/// `pending` holds one digest per set bit of the leaf count, ordered from the largest (leftmost)
/// subtree to the smallest.
#[derive(Clone, Debug)]
pub struct Streaming<H: CHasher> {
    hasher: Standard<H>,
    pending: Vec<H::Digest>,
    leaves: u64,
    empty: H::Digest,
}

impl<H: CHasher> Default for Streaming<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: CHasher> Streaming<H> {
    /// Creates a tree with no leaves.
    pub fn new() -> Self {
        let mut hasher = Standard::<H>::new();
        let empty = hasher.digest(&EMPTY_PREIMAGE);
        Self {
            hasher,
            pending: Vec::new(),
            leaves: 0,
            empty,
        }
    }

    /// Hashes `data` as a leaf and appends it.
    pub fn add(&mut self, data: &[u8]) {
        let leaf = self.hasher.leaf_digest(data);
        self.add_digest(leaf);
    }

    /// Appends a digest that has already been hashed as a leaf (or is the root of another tree).
    pub fn add_digest(&mut self, digest: H::Digest) {
        self.pending.push(digest);

        // Merge equal-height subtrees: one merge per trailing one bit of the previous count.
        let mut count = self.leaves;
        while count & 1 == 1 {
            let right = self.pending.pop().expect("pending holds one root per set bit");
            let left = self.pending.pop().expect("pending holds one root per set bit");
            let merged = self.hasher.node_digest(&left, &right);
            self.pending.push(merged);
            count >>= 1;
        }
        self.leaves += 1;
    }

    /// Returns the root of all leaves added so far.
    ///
    /// Subtree roots are folded from right to left. The accumulator is left unchanged, so more
    /// leaves may be added afterwards.
    pub fn root(&mut self) -> H::Digest {
        let Some((last, rest)) = self.pending.split_last() else {
            return self.empty;
        };
        let mut root = *last;
        for digest in rest.iter().rev() {
            root = self.hasher.node_digest(digest, &root);
        }
        root
    }

    /// Returns the number of leaves added so far.
    pub fn leaves(&self) -> u64 {
        self.leaves
    }

    /// Returns the root reported by a tree with no leaves.
    pub fn empty_root(&self) -> H::Digest {
        self.empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstream_cryptography::{hash, Sha384};
    use blockstream_utils::hex;
    use test_case::test_case;

    const ZERO_BYTE_DIGEST: &str = "bec021b4f368e3069134e012c2b4307083d3a9bdd206e24e5f0d86e13d6636655933ec2b413465966817a9c208a11717";

    #[test]
    fn test_empty() {
        let mut tree = Streaming::<Sha384>::new();
        assert_eq!(tree.leaves(), 0);
        assert_eq!(tree.root(), tree.empty_root());
        assert_eq!(hex(&tree.root()), ZERO_BYTE_DIGEST);
        assert_eq!(tree.root(), hash(&[0x00]));
    }

    #[test_case(1, "1dd6f7b457ad880d840d41c961283bab688e94e4b59359ea45686581e90feccea3c624b1226113f824f315eb60ae0a7c"; "one leaf")]
    #[test_case(2, "1bd6d69fb440f75f05901556a230300544a17f1b559f0afa83d742b0d10f938e6fb28ed3f5210eda8ba2a741d4222653"; "two leaves")]
    #[test_case(3, "c84d5ef5565ebd554d692d4a9500c7f328f05c0a661cc627a036dcb84f6563a27ceabf32fdf70c77e4c527f7490f2fa8"; "three leaves")]
    #[test_case(5, "b1b2461b14e7913daba69f18b8d97b86db8cb083dec98df6e811d8c7898356205ca4c0d9c79006a868b7f39c68d12795"; "five leaves")]
    #[test_case(8, "163a4ecff9c3c522b36d3a398dd8f682c8e82eaff4a4b09df99f18fd2b6de0321370aa93e5d963db40023c9b851e1974"; "eight leaves")]
    fn test_root_vectors(count: u8, expected: &str) {
        let mut tree = Streaming::<Sha384>::new();
        for i in 0..count {
            tree.add(&[i]);
        }
        assert_eq!(tree.leaves(), count as u64);
        assert_eq!(hex(&tree.root()), expected);
    }

    #[test]
    fn test_root_shape() {
        let mut hasher = Standard::<Sha384>::new();
        let leaves: Vec<_> = (0u8..5).map(|i| hasher.leaf_digest(&[i])).collect();

        let mut tree = Streaming::<Sha384>::new();
        for i in 0u8..5 {
            tree.add(&[i]);
        }

        let l01 = hasher.node_digest(&leaves[0], &leaves[1]);
        let l23 = hasher.node_digest(&leaves[2], &leaves[3]);
        let l0123 = hasher.node_digest(&l01, &l23);
        assert_eq!(tree.root(), hasher.node_digest(&l0123, &leaves[4]));

        // Perfect trees agree with a pairwise fold
        tree.add(&[5]);
        tree.add(&[6]);
        tree.add(&[7]);
        let all: Vec<_> = (0u8..8).map(|i| hasher.leaf_digest(&[i])).collect();
        assert_eq!(tree.root(), hasher.combine(&all).unwrap());
    }

    #[test]
    fn test_pending_tracks_set_bits() {
        let mut tree = Streaming::<Sha384>::new();
        for i in 0u32..100 {
            tree.add(&i.to_be_bytes());
            assert_eq!(
                tree.pending.len() as u32,
                tree.leaves().count_ones(),
                "leaves={}",
                tree.leaves()
            );
        }
    }

    #[test]
    fn test_root_does_not_disturb_state() {
        let mut observed = Streaming::<Sha384>::new();
        let mut untouched = Streaming::<Sha384>::new();
        for i in 0u32..37 {
            observed.add(&i.to_be_bytes());
            untouched.add(&i.to_be_bytes());
            let first = observed.root();
            assert_eq!(first, observed.root());
        }
        assert_eq!(observed.root(), untouched.root());
    }

    #[test]
    fn test_add_digest_matches_add() {
        let mut hasher = Standard::<Sha384>::new();
        let mut hashed = Streaming::<Sha384>::new();
        let mut raw = Streaming::<Sha384>::new();
        for i in 0u8..11 {
            hashed.add_digest(hasher.leaf_digest(&[i]));
            raw.add(&[i]);
        }
        assert_eq!(hashed.root(), raw.root());
    }

    #[test]
    fn test_distinct_inputs() {
        let mut a = Streaming::<Sha384>::new();
        let mut b = Streaming::<Sha384>::new();
        a.add(b"a");
        a.add(b"b");
        b.add(b"b");
        b.add(b"a");
        assert_ne!(a.root(), b.root());

        // A lone leaf never equals the empty sentinel
        let mut c = Streaming::<Sha384>::new();
        c.add(&[]);
        assert_ne!(c.root(), c.empty_root());
    }
}
