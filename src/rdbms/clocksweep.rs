use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use tracing::trace;

use crate::buffer::{entity::Buffer, manager::*};
use crate::storage::{entity::PageId, manager::*};

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BufferId(usize);

#[derive(Debug, Default)]
struct Frame {
    usage_count: u64,
    buffer: Rc<Buffer>,
}

struct BufferPool {
    buffers: Vec<Frame>,
    next_victim_id: BufferId,
}

impl Index<BufferId> for BufferPool {
    type Output = Frame;
    fn index(&self, index: BufferId) -> &Self::Output {
        &self.buffers[index.0]
    }
}

impl IndexMut<BufferId> for BufferPool {
    fn index_mut(&mut self, index: BufferId) -> &mut Self::Output {
        &mut self.buffers[index.0]
    }
}

impl BufferPool {
    fn new(pool_size: usize) -> Self {
        let mut buffers = vec![];
        buffers.resize_with(pool_size, Default::default);
        Self {
            buffers,
            next_victim_id: BufferId::default(),
        }
    }

    fn size(&self) -> usize {
        self.buffers.len()
    }

    // Clock-sweep. A frame whose buffer is still shared (pinned) is never chosen.
    fn evict(&mut self) -> Option<BufferId> {
        let pool_size = self.size();
        if pool_size == 0 {
            return None;
        }
        let mut consecutive_pinned = 0;
        let victim_id = loop {
            let next_victim_id = self.next_victim_id;
            let frame = &mut self[next_victim_id];
            if Rc::get_mut(&mut frame.buffer).is_some() {
                if frame.usage_count == 0 {
                    break next_victim_id;
                }
                frame.usage_count -= 1;
                consecutive_pinned = 0;
            } else {
                consecutive_pinned += 1;
                if consecutive_pinned >= pool_size {
                    return None;
                }
            }
            self.next_victim_id = self.increment_id(next_victim_id);
        };
        Some(victim_id)
    }

    fn increment_id(&self, buffer_id: BufferId) -> BufferId {
        BufferId((buffer_id.0 + 1) % self.size())
    }
}

pub struct ClockSweepManager<T: StorageManager> {
    disk: T,
    pool: BufferPool,
    page_table: HashMap<PageId, BufferId>,
}

impl<T: StorageManager> ClockSweepManager<T> {
    pub fn new(disk: T, pool_size: usize) -> Self {
        Self {
            disk,
            pool: BufferPool::new(pool_size),
            page_table: HashMap::new(),
        }
    }

    // Picks a victim frame and writes it back if dirty. The frame is left unpinned.
    fn reclaim(&mut self) -> Result<BufferId, Error> {
        let buffer_id = self.pool.evict().ok_or(Error::NoFreeBuffer)?;
        let frame = &mut self.pool[buffer_id];
        let buffer = Rc::get_mut(&mut frame.buffer).ok_or(Error::NoFreeBuffer)?;
        let evict_page_id = buffer.page_id;
        if buffer.is_dirty.get() {
            trace!(page_id = evict_page_id.to_u64(), "write back dirty page");
            self.disk
                .write_page_data(evict_page_id, buffer.page.get_mut())?;
            buffer.is_dirty.set(false);
        }
        self.page_table.remove(&evict_page_id);
        Ok(buffer_id)
    }
}

impl<T: StorageManager> BufferPoolManager for ClockSweepManager<T> {
    fn fetch_page(&mut self, page_id: PageId) -> Result<Rc<Buffer>, Error> {
        if let Some(&buffer_id) = self.page_table.get(&page_id) {
            let frame = &mut self.pool[buffer_id];
            frame.usage_count += 1;
            return Ok(Rc::clone(&frame.buffer));
        }
        let buffer_id = self.reclaim()?;
        let frame = &mut self.pool[buffer_id];
        {
            let buffer = Rc::get_mut(&mut frame.buffer).ok_or(Error::NoFreeBuffer)?;
            buffer.page_id = PageId::INVALID_PAGE_ID;
            self.disk.read_page_data(page_id, buffer.page.get_mut())?;
            buffer.page_id = page_id;
            buffer.is_dirty.set(false);
            frame.usage_count = 1;
        }
        self.page_table.insert(page_id, buffer_id);
        Ok(Rc::clone(&frame.buffer))
    }

    fn create_page(&mut self) -> Result<Rc<Buffer>, Error> {
        let buffer_id = self.reclaim()?;
        let page_id = self.disk.allocate_page();
        let frame = &mut self.pool[buffer_id];
        {
            let buffer = Rc::get_mut(&mut frame.buffer).ok_or(Error::NoFreeBuffer)?;
            *buffer = Buffer::default();
            buffer.page_id = page_id;
            buffer.is_dirty.set(true);
            frame.usage_count = 1;
        }
        self.page_table.insert(page_id, buffer_id);
        Ok(Rc::clone(&frame.buffer))
    }

    fn flush(&mut self) -> Result<(), Error> {
        for (&page_id, &buffer_id) in self.page_table.iter() {
            let frame = &self.pool[buffer_id];
            if !frame.buffer.is_dirty.get() {
                continue;
            }
            let page = frame.buffer.page.borrow();
            self.disk.write_page_data(page_id, page.as_ref())?;
            frame.buffer.is_dirty.set(false);
        }
        self.disk.sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::entity::PAGE_SIZE;
    use std::io;

    #[derive(Debug, PartialEq)]
    enum Op {
        Alloc(PageId),
        Read(PageId),
        Write(PageId),
        Sync,
    }

    struct TraceStorage {
        next_page_id: u64,
        history: Vec<Op>,
    }

    impl TraceStorage {
        fn new() -> Self {
            Self {
                next_page_id: 1,
                history: vec![],
            }
        }
    }

    impl StorageManager for TraceStorage {
        fn allocate_page(&mut self) -> PageId {
            let pid = PageId(self.next_page_id);
            self.next_page_id += 1;
            self.history.push(Op::Alloc(pid));
            pid
        }
        fn read_page_data(&mut self, page_id: PageId, _data: &mut [u8]) -> io::Result<()> {
            self.history.push(Op::Read(page_id));
            Ok(())
        }
        fn write_page_data(&mut self, page_id: PageId, _data: &[u8]) -> io::Result<()> {
            self.history.push(Op::Write(page_id));
            Ok(())
        }
        fn sync(&mut self) -> io::Result<()> {
            self.history.push(Op::Sync);
            Ok(())
        }
    }

    #[test]
    fn create_page_test() {
        let mut bufmgr = ClockSweepManager::new(TraceStorage::new(), 1);
        {
            let buffer = bufmgr.create_page().unwrap();
            assert_eq!(buffer.page_id, PageId(1));
            assert_eq!(vec![Op::Alloc(PageId(1))], bufmgr.disk.history);

            // the only frame is pinned
            assert!(bufmgr.create_page().is_err());
            assert_eq!(vec![Op::Alloc(PageId(1))], bufmgr.disk.history);
        }
        {
            let buffer = bufmgr.create_page().unwrap();
            assert_eq!(buffer.page_id, PageId(2));
            // new pages are dirty, so the victim is written back first
            assert_eq!(
                vec![
                    Op::Alloc(PageId(1)),
                    Op::Write(PageId(1)),
                    Op::Alloc(PageId(2))
                ],
                bufmgr.disk.history
            );
        }
    }

    #[test]
    fn fetch_page_test() {
        let mut bufmgr = ClockSweepManager::new(TraceStorage::new(), 1);
        {
            let res = bufmgr.fetch_page(PageId(1));
            assert!(res.is_ok());
            assert_eq!(vec![Op::Read(PageId(1))], bufmgr.disk.history);

            // hit the cache
            let res_same_page = bufmgr.fetch_page(PageId(1));
            assert!(res_same_page.is_ok());
            assert_eq!(vec![Op::Read(PageId(1))], bufmgr.disk.history);

            let res_err = bufmgr.fetch_page(PageId(2));
            assert!(matches!(res_err, Err(Error::NoFreeBuffer)));
            assert_eq!(vec![Op::Read(PageId(1))], bufmgr.disk.history);
        }
        {
            let buffer = bufmgr.fetch_page(PageId(2)).unwrap();
            // clean victim, no write back
            assert_eq!(
                vec![Op::Read(PageId(1)), Op::Read(PageId(2))],
                bufmgr.disk.history
            );
            buffer.page.borrow_mut().copy_from_slice(&[42u8; PAGE_SIZE]);
            buffer.is_dirty.set(true);
        }
        {
            let res = bufmgr.fetch_page(PageId(1));
            assert!(res.is_ok());
            assert_eq!(
                vec![
                    Op::Read(PageId(1)),
                    Op::Read(PageId(2)),
                    Op::Write(PageId(2)),
                    Op::Read(PageId(1)),
                ],
                bufmgr.disk.history
            );
        }
    }

    #[test]
    fn flush_test() {
        let mut bufmgr = ClockSweepManager::new(TraceStorage::new(), 3);
        bufmgr.flush().unwrap();
        assert_eq!(vec![Op::Sync], bufmgr.disk.history);

        {
            let _ = bufmgr.fetch_page(PageId(1)).unwrap();
            // clean page is not written
            bufmgr.flush().unwrap();
            assert_eq!(
                vec![Op::Sync, Op::Read(PageId(1)), Op::Sync],
                bufmgr.disk.history
            );
        }
        {
            let buffer = bufmgr.fetch_page(PageId(1)).unwrap();
            buffer.is_dirty.set(true);
            drop(buffer);
            bufmgr.flush().unwrap();
            assert_eq!(
                vec![
                    Op::Sync,
                    Op::Read(PageId(1)),
                    Op::Sync,
                    Op::Write(PageId(1)),
                    Op::Sync,
                ],
                bufmgr.disk.history
            );
            // flushed pages are clean again
            bufmgr.flush().unwrap();
            assert_eq!(6, bufmgr.disk.history.len());
        }
    }
}
