// Rylox heap
// Changelog:
// 2026-07-12: Allocator with string interning over the weak strings table;
//            every allocation is prepended to the intrusive object list and its
//            size recorded in the header, including the heap footprint of interior
//            containers (string capacity, chunk vectors, closure upvalue arrays),
//            so the sweep phase can account bytes without re-measuring payloads.
// 2026-07-18: Tri-color machinery: mark pushes onto a gray worklist, tracing
//            blackens by kind; sweep unlinks and frees unmarked objects and
//            reports what it reclaimed for the GC debug summary.

use crate::common::object::{
    GcObject, HeaderOnly, NativeFn, ObjClosure, ObjFunction, ObjKind, ObjNative, ObjString,
    ObjUpvalue, RawObject, Value,
};
use crate::common::table::Table;

/// First collection once a megabyte is live.
const GC_INITIAL_THRESHOLD: usize = 1024 * 1024;
/// Ultimate safeguard against runaway scripts.
const HARD_MEMORY_LIMIT: usize = 1024 * 1024 * 512;
const GC_HEAP_GROW_FACTOR: usize = 2;

pub struct Heap {
    pub all_objects: RawObject,
    /// Weak interning table: keys are not GC roots, unmarked entries are
    /// swept between tracing and the object sweep.
    pub strings: Table,
    pub bytes_allocated: usize,
    pub next_gc: usize,
    /// Collect at every safe point, for shaking out rooting bugs.
    pub gc_stress: bool,
    // peak watermark, GC 调参用，不参与回收逻辑
    pub max_allocated: usize,
    gray: Vec<RawObject>,
}

fn hash_string(chars: &str) -> u32 {
    // FNV-1a
    let mut hash: u32 = 2166136261;
    for byte in chars.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

impl Heap {
    pub fn new() -> Self {
        Self {
            all_objects: std::ptr::null_mut(),
            strings: Table::new(),
            bytes_allocated: 0,
            next_gc: GC_INITIAL_THRESHOLD,
            gc_stress: false,
            max_allocated: 0,
            gray: Vec::new(),
        }
    }

    fn alloc_raw<T>(&mut self, data: T, kind: ObjKind, size: usize) -> Option<*mut GcObject<T>> {
        if self.bytes_allocated + size > HARD_MEMORY_LIMIT {
            return None;
        }

        let boxed = Box::new(GcObject {
            mark: false,
            kind,
            size,
            next: self.all_objects,
            data,
        });
        let ptr = Box::into_raw(boxed);
        self.all_objects = ptr as RawObject;

        self.bytes_allocated += size;
        if self.bytes_allocated > self.max_allocated {
            self.max_allocated = self.bytes_allocated;
        }

        Some(ptr)
    }

    fn allocate_string(&mut self, chars: String, hash: u32) -> Option<*mut GcObject<ObjString>> {
        let size = std::mem::size_of::<GcObject<ObjString>>() + chars.capacity();
        let ptr = self.alloc_raw(ObjString { chars, hash }, ObjKind::Str, size)?;
        self.strings.set(ptr, Value::Nil);
        Some(ptr)
    }

    /// Interning entry point for borrowed bytes: returns the canonical object
    /// for these chars, copying them only on a miss.
    pub fn copy_string(&mut self, chars: &str) -> Option<*mut GcObject<ObjString>> {
        let hash = hash_string(chars);
        if let Some(interned) = self.strings.find_string(chars, hash) {
            return Some(interned);
        }
        self.allocate_string(chars.to_string(), hash)
    }

    /// Same as `copy_string` but takes ownership of the buffer, dropping it
    /// when an interned object already exists.
    pub fn take_string(&mut self, chars: String) -> Option<*mut GcObject<ObjString>> {
        let hash = hash_string(&chars);
        if let Some(interned) = self.strings.find_string(&chars, hash) {
            return Some(interned);
        }
        self.allocate_string(chars, hash)
    }

    /// Functions start empty; the compiler fills in arity, name and chunk.
    pub fn alloc_function(&mut self) -> Option<*mut GcObject<ObjFunction>> {
        let function = ObjFunction {
            arity: 0,
            upvalue_count: 0,
            chunk: crate::common::chunk::Chunk::new(),
            name: std::ptr::null_mut(),
        };
        let size = std::mem::size_of::<GcObject<ObjFunction>>();
        self.alloc_raw(function, ObjKind::Function, size)
    }

    pub fn alloc_native(&mut self, function: NativeFn) -> Option<*mut GcObject<ObjNative>> {
        let size = std::mem::size_of::<GcObject<ObjNative>>();
        self.alloc_raw(ObjNative { function }, ObjKind::Native, size)
    }

    pub fn alloc_closure(
        &mut self,
        function: *mut GcObject<ObjFunction>,
    ) -> Option<*mut GcObject<ObjClosure>> {
        let upvalue_count = unsafe { (*function).data.upvalue_count };
        let upvalues = vec![std::ptr::null_mut(); upvalue_count];
        let size = std::mem::size_of::<GcObject<ObjClosure>>()
            + upvalues.capacity() * std::mem::size_of::<*mut GcObject<ObjUpvalue>>();
        self.alloc_raw(ObjClosure { function, upvalues }, ObjKind::Closure, size)
    }

    pub fn alloc_upvalue(&mut self, location: *mut Value) -> Option<*mut GcObject<ObjUpvalue>> {
        let size = std::mem::size_of::<GcObject<ObjUpvalue>>();
        self.alloc_raw(
            ObjUpvalue {
                location,
                closed: Value::Nil,
                next: std::ptr::null_mut(),
            },
            ObjKind::Upvalue,
            size,
        )
    }

    pub fn should_collect(&self) -> bool {
        self.gc_stress || self.bytes_allocated > self.next_gc
    }

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(ptr) = value {
            self.mark_object(ptr);
        }
    }

    pub fn mark_object(&mut self, ptr: RawObject) {
        if ptr.is_null() || unsafe { (*ptr).mark } {
            return;
        }
        unsafe {
            (*ptr).mark = true;
        }
        self.gray.push(ptr);
    }

    /// Drains the gray worklist, marking every outgoing reference of each
    /// gray object.
    pub fn trace_references(&mut self) {
        while let Some(ptr) = self.gray.pop() {
            self.blacken(ptr);
        }
    }

    fn blacken(&mut self, ptr: RawObject) {
        unsafe {
            match (*ptr).kind {
                // strings and natives hold no outgoing references
                ObjKind::Str | ObjKind::Native => {}
                ObjKind::Upvalue => {
                    let upvalue = ptr as *mut GcObject<ObjUpvalue>;
                    self.mark_value((*upvalue).data.closed);
                }
                ObjKind::Function => {
                    let function = ptr as *mut GcObject<ObjFunction>;
                    self.mark_object((*function).data.name as RawObject);
                    for i in 0..(*function).data.chunk.constants.len() {
                        self.mark_value((&(*function).data.chunk.constants)[i]);
                    }
                }
                ObjKind::Closure => {
                    let closure = ptr as *mut GcObject<ObjClosure>;
                    self.mark_object((*closure).data.function as RawObject);
                    for i in 0..(*closure).data.upvalues.len() {
                        self.mark_object((&(*closure).data.upvalues)[i] as RawObject);
                    }
                }
            }
        }
    }

    /// Walks the object list, unlinking and freeing everything unmarked and
    /// clearing the mark on survivors. Returns (objects, bytes) reclaimed.
    pub fn sweep(&mut self) -> (usize, usize) {
        let mut swept_count = 0;
        let mut swept_bytes = 0;

        unsafe {
            let mut prev: RawObject = std::ptr::null_mut();
            let mut curr = self.all_objects;

            while !curr.is_null() {
                if (*curr).mark {
                    (*curr).mark = false;
                    prev = curr;
                    curr = (*curr).next;
                } else {
                    let next = (*curr).next;
                    if prev.is_null() {
                        self.all_objects = next;
                    } else {
                        (*prev).next = next;
                    }

                    swept_count += 1;
                    swept_bytes += (*curr).size;
                    self.free_object(curr);

                    curr = next;
                }
            }
        }

        self.bytes_allocated = self.bytes_allocated.saturating_sub(swept_bytes);
        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;
        (swept_count, swept_bytes)
    }

    unsafe fn free_object(&mut self, ptr: RawObject) {
        unsafe {
            match (*ptr).kind {
                ObjKind::Str => {
                    let _ = Box::from_raw(ptr as *mut GcObject<ObjString>);
                }
                ObjKind::Function => {
                    let _ = Box::from_raw(ptr as *mut GcObject<ObjFunction>);
                }
                ObjKind::Native => {
                    let _ = Box::from_raw(ptr as *mut GcObject<ObjNative>);
                }
                ObjKind::Closure => {
                    let _ = Box::from_raw(ptr as *mut GcObject<ObjClosure>);
                }
                ObjKind::Upvalue => {
                    let _ = Box::from_raw(ptr as *mut GcObject<ObjUpvalue>);
                }
            }
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Heap {
    // VM teardown frees the whole object list in one pass, no marking
    fn drop(&mut self) {
        unsafe {
            let mut curr = self.all_objects;
            while !curr.is_null() {
                let next = (*curr).next;
                self.free_object(curr);
                curr = next;
            }
        }
        self.all_objects = std::ptr::null_mut();
    }
}
