use std::collections::HashMap;

/// Byte-addressed access to the 32-bit physical address space.
///
/// Only `read_u8`/`write_u8` are required; the wider and bulk accessors are little-endian
/// compositions of them. Implementations may override the bulk paths for speed.
pub trait MemoryBus {
    fn read_u8(&self, addr: u32) -> u8;
    fn write_u8(&mut self, addr: u32, value: u8);

    fn read_bytes(&self, addr: u32, buf: &mut [u8]) {
        for (i, out) in buf.iter_mut().enumerate() {
            *out = self.read_u8(addr.wrapping_add(i as u32));
        }
    }

    fn write_bytes(&mut self, addr: u32, buf: &[u8]) {
        for (i, &b) in buf.iter().enumerate() {
            self.write_u8(addr.wrapping_add(i as u32), b);
        }
    }

    fn fill(&mut self, addr: u32, len: usize, value: u8) {
        for i in 0..len {
            self.write_u8(addr.wrapping_add(i as u32), value);
        }
    }

    fn read_u16(&self, addr: u32) -> u16 {
        let lo = self.read_u8(addr) as u16;
        let hi = self.read_u8(addr.wrapping_add(1)) as u16;
        lo | (hi << 8)
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        self.write_u8(addr, (value & 0xFF) as u8);
        self.write_u8(addr.wrapping_add(1), (value >> 8) as u8);
    }

    fn read_u32(&self, addr: u32) -> u32 {
        let lo = self.read_u16(addr) as u32;
        let hi = self.read_u16(addr.wrapping_add(2)) as u32;
        lo | (hi << 16)
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        self.write_u16(addr, (value & 0xFFFF) as u16);
        self.write_u16(addr.wrapping_add(2), (value >> 16) as u16);
    }

    /// Reads a NUL-terminated byte string starting at `addr`, stopping after `max` bytes if no
    /// terminator is found. The terminator is not included.
    fn read_cstr(&self, addr: u32, max: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..max {
            let b = self.read_u8(addr.wrapping_add(i as u32));
            if b == 0 {
                break;
            }
            out.push(b);
        }
        out
    }

    /// Reads 16-bit words starting at `addr` until `sentinel` (not included) or `max` words.
    fn read_words_until(&self, addr: u32, sentinel: u16, max: usize) -> Vec<u16> {
        let mut out = Vec::new();
        for i in 0..max {
            let w = self.read_u16(addr.wrapping_add((i * 2) as u32));
            if w == sentinel {
                break;
            }
            out.push(w);
        }
        out
    }
}

const PAGE_SHIFT: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
const PAGE_MASK: u32 = (PAGE_SIZE as u32) - 1;

/// Sparse physical memory covering the whole 32-bit address space.
///
/// Pages are allocated on first write; reads of untouched pages return zero and do not allocate.
#[derive(Debug, Default, Clone)]
pub struct PhysicalMemory {
    pages: HashMap<u32, Box<[u8; PAGE_SIZE]>>,
}

impl PhysicalMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocated_pages(&self) -> usize {
        self.pages.len()
    }
}

impl MemoryBus for PhysicalMemory {
    fn read_u8(&self, addr: u32) -> u8 {
        self.pages
            .get(&(addr >> PAGE_SHIFT))
            .map_or(0, |page| page[(addr & PAGE_MASK) as usize])
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        let page = self
            .pages
            .entry(addr >> PAGE_SHIFT)
            .or_insert_with(|| Box::new([0; PAGE_SIZE]));
        page[(addr & PAGE_MASK) as usize] = value;
    }

    fn read_bytes(&self, addr: u32, buf: &mut [u8]) {
        let mut done = 0usize;
        while done < buf.len() {
            let cur = addr.wrapping_add(done as u32);
            let in_page = (cur & PAGE_MASK) as usize;
            let chunk = (PAGE_SIZE - in_page).min(buf.len() - done);
            match self.pages.get(&(cur >> PAGE_SHIFT)) {
                Some(page) => buf[done..done + chunk].copy_from_slice(&page[in_page..in_page + chunk]),
                None => buf[done..done + chunk].fill(0),
            }
            done += chunk;
        }
    }

    fn write_bytes(&mut self, addr: u32, buf: &[u8]) {
        let mut done = 0usize;
        while done < buf.len() {
            let cur = addr.wrapping_add(done as u32);
            let in_page = (cur & PAGE_MASK) as usize;
            let chunk = (PAGE_SIZE - in_page).min(buf.len() - done);
            let page = self
                .pages
                .entry(cur >> PAGE_SHIFT)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));
            page[in_page..in_page + chunk].copy_from_slice(&buf[done..done + chunk]);
            done += chunk;
        }
    }

    fn fill(&mut self, addr: u32, len: usize, value: u8) {
        let mut done = 0usize;
        while done < len {
            let cur = addr.wrapping_add(done as u32);
            let in_page = (cur & PAGE_MASK) as usize;
            let chunk = (PAGE_SIZE - in_page).min(len - done);
            let key = cur >> PAGE_SHIFT;
            // Zero-filling an untouched page is a no-op.
            if value != 0 || self.pages.contains_key(&key) {
                let page = self
                    .pages
                    .entry(key)
                    .or_insert_with(|| Box::new([0; PAGE_SIZE]));
                page[in_page..in_page + chunk].fill(value);
            }
            done += chunk;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_do_not_allocate() {
        let mem = PhysicalMemory::new();
        let mut buf = [0xAAu8; 32];
        mem.read_bytes(0xE000_0000, &mut buf);
        assert_eq!(buf, [0u8; 32]);
        assert_eq!(mem.allocated_pages(), 0);
    }

    #[test]
    fn bulk_write_spans_pages() {
        let mut mem = PhysicalMemory::new();
        let data: Vec<u8> = (0..=255u8).cycle().take(3 * PAGE_SIZE).collect();
        mem.write_bytes(0x0002_0F00, &data);
        assert_eq!(mem.allocated_pages(), 4);

        let mut back = vec![0u8; data.len()];
        mem.read_bytes(0x0002_0F00, &mut back);
        assert_eq!(back, data);
        assert_eq!(mem.read_u16(0x0002_0F00), 0x0100);
    }

    #[test]
    fn zero_fill_skips_untouched_pages() {
        let mut mem = PhysicalMemory::new();
        mem.write_u8(0xE000_1000, 0x55);
        mem.fill(0xE000_0000, 4 * PAGE_SIZE, 0);
        assert_eq!(mem.allocated_pages(), 1);
        assert_eq!(mem.read_u8(0xE000_1000), 0);

        mem.fill(0xE000_0FFE, 4, 0x11);
        assert_eq!(mem.read_u32(0xE000_0FFE), 0x1111_1111);
        assert_eq!(mem.allocated_pages(), 2);
    }

    #[test]
    fn string_and_word_list_readers_stop_at_terminators() {
        let mut mem = PhysicalMemory::new();
        mem.write_bytes(0x1000, b"SVGA BIOS\0junk");
        assert_eq!(mem.read_cstr(0x1000, 64), b"SVGA BIOS");
        assert_eq!(mem.read_cstr(0x1000, 4), b"SVGA");

        for (i, w) in [0x101u16, 0x103, 0xFFFF, 0x105].iter().enumerate() {
            mem.write_u16(0x2000 + i as u32 * 2, *w);
        }
        assert_eq!(mem.read_words_until(0x2000, 0xFFFF, 16), vec![0x101, 0x103]);
        assert_eq!(mem.read_words_until(0x2000, 0xFFFF, 1), vec![0x101]);
    }
}
