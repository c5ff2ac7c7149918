//! Integration tests for the free-list allocator

use nebula_alloc::{Allocator, Block, FreeListAllocator, FreeListConfig, HeapAllocator};
use rstest::rstest;

/// Upstream wrapper that counts the calls reaching it
#[derive(Default)]
struct Counting {
    heap: HeapAllocator,
    allocations: usize,
    deallocations: usize,
}

unsafe impl Allocator for Counting {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        self.allocations += 1;
        self.heap.allocate(size, align)
    }

    unsafe fn deallocate(&mut self, block: &mut Block) {
        self.deallocations += 1;
        unsafe { self.heap.deallocate(block) };
    }

    fn owns(&self, block: &Block) -> bool {
        self.heap.owns(block)
    }
}

fn warmed(config: FreeListConfig, recycled: usize) -> FreeListAllocator<Counting> {
    let mut list = FreeListAllocator::new(Counting::default(), config).expect("Invalid window");
    let mut blocks: Vec<Block> = (0..recycled).map(|_| list.allocate(config.max, 8)).collect();
    for block in &mut blocks {
        unsafe { list.deallocate(block) };
    }
    assert_eq!(list.recycled(), recycled);
    list
}

#[rstest]
#[case(FreeListConfig::exact(64), 64)]
#[case(FreeListConfig::new(64, 32, 64), 32)]
#[case(FreeListConfig::new(64, 32, 64), 48)]
#[case(FreeListConfig::up_to(128), 0)]
#[case(FreeListConfig::up_to(128), 128)]
fn test_in_window_served_from_list(#[case] config: FreeListConfig, #[case] size: usize) {
    let mut list = warmed(config, 2);
    let upstream_calls = list.upstream().allocations;

    let mut block = list.allocate(size, 8);
    assert!(!block.is_empty());
    assert_eq!(block.size(), size);
    assert_eq!(list.upstream().allocations, upstream_calls);
    assert_eq!(list.recycled(), 1);

    unsafe { list.deallocate(&mut block) };
    assert_eq!(list.recycled(), 2);
    assert_eq!(list.upstream().deallocations, 0);
}

#[rstest]
#[case(FreeListConfig::exact(64), 63)]
#[case(FreeListConfig::exact(64), 65)]
#[case(FreeListConfig::new(64, 32, 48), 31)]
#[case(FreeListConfig::new(64, 32, 48), 64)]
#[case(FreeListConfig::up_to(128), 4096)]
fn test_out_of_window_always_upstream(#[case] config: FreeListConfig, #[case] size: usize) {
    let mut list = warmed(config, 3);
    let upstream_calls = list.upstream().allocations;

    let mut block = list.allocate(size, 8);
    assert_eq!(block.size(), size);
    assert_eq!(list.upstream().allocations, upstream_calls + 1);
    assert_eq!(list.recycled(), 3);

    unsafe { list.deallocate(&mut block) };
    assert_eq!(list.upstream().deallocations, 1);
    assert_eq!(list.recycled(), 3);
}

#[test]
fn test_empty_list_takes_block_size_from_upstream() {
    let mut list =
        FreeListAllocator::new(Counting::default(), FreeListConfig::new(96, 16, 64)).expect("Invalid window");
    let mut block = list.allocate(16, 8);
    assert_eq!(list.upstream().allocations, 1);

    // The recycled region is a full block: the largest in-window request fits.
    unsafe { list.deallocate(&mut block) };
    let big = list.allocate(64, 8);
    unsafe { big.as_mut_slice().fill(0xEE) };
    assert_eq!(list.upstream().allocations, 1);
}

#[test]
fn test_drop_returns_recycled_blocks() {
    let mut upstream = Counting::default();
    {
        let mut list = FreeListAllocator::new(&mut upstream, FreeListConfig::exact(32)).expect("Invalid window");
        let mut blocks: Vec<Block> = (0..4).map(|_| list.allocate(32, 8)).collect();
        for block in &mut blocks {
            unsafe { list.deallocate(block) };
        }
        assert_eq!(list.recycled(), 4);
    }
    assert_eq!(upstream.allocations, 4);
    assert_eq!(upstream.deallocations, 4);
}

#[cfg(debug_assertions)]
#[test]
fn test_misrouted_free_leaves_list_intact() {
    let mut list = warmed(FreeListConfig::exact(64), 1);
    let mut other = FreeListAllocator::new(HeapAllocator::new(), FreeListConfig::exact(64)).expect("Invalid window");

    let mut stranger = other.allocate(64, 8);
    let mut copy = stranger;
    unsafe { list.deallocate(&mut copy) };
    assert!(copy.is_empty());
    assert_eq!(list.recycled(), 1);
    assert!(!list.owns(&stranger));

    let mut unstamped = Block::from_raw(Box::into_raw(Box::new([0u8; 64])).cast(), 64);
    let raw = unstamped.as_ptr();
    unsafe { list.deallocate(&mut unstamped) };
    assert_eq!(list.recycled(), 1);

    let mine = list.allocate(64, 8);
    assert_ne!(mine.addr(), stranger.addr());
    assert_ne!(mine.addr(), raw as usize);

    unsafe {
        other.deallocate(&mut stranger);
        drop(Box::from_raw(raw.cast::<[u8; 64]>()));
    }
}
