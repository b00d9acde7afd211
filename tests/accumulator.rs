use utreexo::*;

fn utxo(i: u32) -> LeafData {
    LeafData::new(
        [0x11; 32],
        OutPoint {
            txid: [i as u8; 32],
            vout: i,
        },
        100 + i,
        i == 0,
        1000 * u64::from(i),
        vec![0x76, 0xa9, i as u8],
    )
    .expect("test heights are small")
}

fn utxos(n: u32) -> Vec<LeafData> {
    (0..n).map(utxo).collect()
}

/// Inserts items into an empty accumulator and returns the proof of all of them.
fn accumulate(items: &[LeafData], hasher: &Hasher<LeafData>) -> (Stump, Proof, Vec<Hash>) {
    let hashes: Vec<Hash> = items.iter().map(|item| hasher.leaf(item)).collect();
    let (stump, update_data) = Stump::new()
        .modify(items, &[], &Proof::default(), hasher)
        .expect("insertions into an empty stump never fail");
    let remembers: Vec<u64> = (0..items.len() as u64).collect();
    let (proof, proven) = Proof::default()
        .update(&[], &hashes, &[], &remembers, &update_data, hasher)
        .expect("additions can always be remembered");
    (stump, proof, proven)
}

#[test]
fn round_trip() {
    let hasher = utreexo_hasher();
    let items = utxos(9);
    let (stump, proof, hashes) = accumulate(&items, &hasher);
    assert_eq!(proof.targets(), &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(proof.hashes().is_empty());
    stump.verify(&proof, &hashes, &hasher).unwrap();
    proof.verify(&hashes, &stump, &hasher).unwrap();
}

#[test]
fn no_op_modification() {
    let hasher = utreexo_hasher::<LeafData>();
    let (stump, _, _) = accumulate(&utxos(6), &hasher);
    let (same, update_data) = stump.modify(&[], &[], &Proof::default(), &hasher).unwrap();
    assert_eq!(same, stump);
    assert!(update_data.is_empty());

    let (empty, update_data) = Stump::new()
        .modify(&[], &[], &Proof::default(), &hasher)
        .unwrap();
    assert_eq!(empty, Stump::new());
    assert!(update_data.is_empty());
}

#[test]
fn roots_follow_leaf_count() {
    let hasher = utreexo_hasher();
    let mut stump = Stump::new();
    for i in 0..40 {
        let (next, _) = stump
            .modify(&[utxo(i)], &[], &Proof::default(), &hasher)
            .unwrap();
        stump = next;
        assert_eq!(stump.roots().len(), stump.num_leaves().count_ones() as usize);
    }
}

#[test]
fn deletion_invalidates_proof() {
    let hasher = utreexo_hasher();
    let items = utxos(8);
    let (stump, proof, hashes) = accumulate(&items, &hasher);

    let del = proof
        .get_proof_subset(&hashes, &[6], stump.num_leaves(), &hasher)
        .unwrap();
    let (after, _) = stump.modify(&[], &[hashes[6]], &del, &hasher).unwrap();

    assert_eq!(after.num_leaves(), 8);
    assert_eq!(
        after.verify(&del, &[hashes[6]], &hasher),
        Err(UtreexoError::InvalidProof)
    );
    // the previous stump is still usable
    stump.verify(&del, &[hashes[6]], &hasher).unwrap();
}

#[test]
fn update_then_verify() {
    let hasher = utreexo_hasher();
    let items = utxos(12);
    let (stump, proof, hashes) = accumulate(&items, &hasher);

    let del = proof
        .get_proof_subset(&hashes, &[3], stump.num_leaves(), &hasher)
        .unwrap();
    let cached = proof
        .get_proof_subset(&hashes, &[9], stump.num_leaves(), &hasher)
        .unwrap();

    let new_items = vec![utxo(12), utxo(13)];
    let new_hashes: Vec<Hash> = new_items.iter().map(|item| hasher.leaf(item)).collect();
    let (stump, update_data) = stump
        .modify(&new_items, &[hashes[3]], &del, &hasher)
        .unwrap();

    let (cached, cached_hashes) = cached
        .update(&[hashes[9]], &new_hashes, &[3], &[1], &update_data, &hasher)
        .unwrap();
    assert_eq!(cached.targets(), &[9, 13]);
    assert_eq!(cached_hashes, vec![hashes[9], new_hashes[1]]);
    stump.verify(&cached, &cached_hashes, &hasher).unwrap();
}

#[test]
fn subset_verifies() {
    let hasher = utreexo_hasher();
    let items = utxos(10);
    let (stump, proof, hashes) = accumulate(&items, &hasher);

    let targets = [0, 4, 5, 6, 7, 8];
    let big = proof
        .get_proof_subset(&hashes, &targets, stump.num_leaves(), &hasher)
        .unwrap();
    let big_hashes: Vec<Hash> = targets.iter().map(|&t| hashes[t as usize]).collect();
    stump.verify(&big, &big_hashes, &hasher).unwrap();

    let small = big
        .get_proof_subset(&big_hashes, &[0, 4, 5], stump.num_leaves(), &hasher)
        .unwrap();
    assert!(small.hashes().len() <= 4);
    stump
        .verify(&small, &[hashes[0], hashes[4], hashes[5]], &hasher)
        .unwrap();

    assert_eq!(
        big.get_proof_subset(&big_hashes, &[0, 9], stump.num_leaves(), &hasher),
        Err(UtreexoError::InvalidTarget(9))
    );
}

#[test]
fn proof_bytes() {
    let hasher = utreexo_hasher();
    let items = utxos(11);
    let (stump, proof, hashes) = accumulate(&items, &hasher);
    let proof = proof
        .get_proof_subset(&hashes, &[2, 10, 7], stump.num_leaves(), &hasher)
        .unwrap();

    let bytes = proof.to_bytes();
    assert_eq!(Proof::from_bytes(&bytes), Ok(proof.clone()));
    assert_eq!(
        Proof::from_bytes(&Proof::default().to_bytes()),
        Ok(Proof::default())
    );

    // cut in the middle of the hashes
    let cut = bytes.len() - 16;
    assert!(matches!(
        Proof::from_bytes(&bytes[..cut]),
        Err(UtreexoError::ParseError(_))
    ));

    assert_eq!(Stump::from_bytes(&stump.to_bytes()), Ok(stump));
}
