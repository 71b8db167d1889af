//! Parallel producer/consumer raster pipeline.
//!
//! One render is split into reading tasks (the caller thread plus
//! configured extras) that stream DEM samples, and computing tasks that
//! slide a 2×2 window over the rows they own and feed each unit element
//! to the kernel. Readers throttle themselves against a shared
//! active-task counter so in-flight buffers stay bounded: with N extra
//! readers and M compute threads at most `(1 + 2·M)·(1 + N)` tasks are
//! queued or running per caller.
//!
//! Row ranges are disjoint across compute tasks, so output writes never
//! collide; the output grid uses relaxed atomic bytes, which makes the
//! disjoint parallel writes safe without any locking on the hot path.

mod awaiter;
mod pool;
mod threadpool;

pub use awaiter::Awaiter;
pub use pool::SampleBufferPool;
pub use threadpool::{caller_pool, close_caller_pool, TaskHandle, WorkerPool};

use crate::cache::HgtFileInfo;
use crate::coord::metres_per_degree_of_latitude;
use crate::dem::{DemStream, NO_DATA_VALUE};
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU8, Ordering};
use std::sync::Arc;

/// Approximate number of unit elements each computing task processes.
/// The actual number is decided by the task decomposition.
pub const ELEMENTS_PER_TASK: usize = 16_000;

/// Default number of additional reader threads per caller.
pub const READER_THREADS_DEFAULT: usize = 1;

/// Default number of additional compute threads per caller.
pub const COMPUTE_THREADS_DEFAULT: usize = 1;

/// Per-element kernel invoked by computing tasks.
///
/// For every unit element (the 2×2 sample window NW/SW/SE/NE around an
/// imaginary centre) the pipeline calls
/// [`UnitKernel::process_unit_element`] exactly once, in row-major order
/// within the task's row range. The kernel owns the output byte layout:
/// it writes through `params.output` and returns the output index for the
/// next element, which encodes any super- or sub-sampling.
pub trait UnitKernel: Send + Sync {
    /// `line` and `col` are the 1-based coordinates of the unit element;
    /// `metres_per_element` is the ground length of one element side.
    #[allow(clippy::too_many_arguments)]
    fn process_unit_element(
        &self,
        nw: f64,
        sw: f64,
        se: f64,
        ne: f64,
        metres_per_element: f64,
        out_ix: usize,
        line: usize,
        col: usize,
        params: &ComputingParams,
    ) -> usize;
}

/// Output byte grid shared by all computing tasks of one render.
pub struct OutputGrid {
    cells: Vec<AtomicU8>,
    width: usize,
}

impl OutputGrid {
    pub fn new(len: usize, width: usize) -> Self {
        Self {
            cells: (0..len).map(|_| AtomicU8::new(0)).collect(),
            width,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set(&self, ix: usize, value: u8) {
        self.cells[ix].store(value, Ordering::Relaxed);
    }

    pub fn get(&self, ix: usize) -> u8 {
        self.cells[ix].load(Ordering::Relaxed)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.cells.into_iter().map(AtomicU8::into_inner).collect()
    }

    fn snapshot(&self) -> Vec<u8> {
        self.cells
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }
}

/// Immutable parameter bundle shared by the tasks of one render.
pub struct ComputingParams {
    pub output: Arc<OutputGrid>,
    pub kernel: Arc<dyn UnitKernel>,
    pub input_axis_len: usize,
    pub output_axis_len: usize,
    pub output_width: usize,
    pub line_buffer_size: usize,
    pub padding: usize,
    /// Signed quality factor: `>= 1` multiplies the axis, `< 0` divides
    /// by the absolute value.
    pub resolution_factor: i32,
    pub north_unit_distance_per_line: f64,
    pub south_unit_distance_per_line: f64,
    pub compute_threads: usize,
    pub max_active_tasks: usize,
    pub active_tasks: AtomicIsize,
    pub input_pool: SampleBufferPool,
    pub line_pool: SampleBufferPool,
    pub stop: Arc<AtomicBool>,
}

impl ComputingParams {
    /// Ground length of one unit element side at `line`, interpolated
    /// linearly between the tile's north and south edges.
    pub fn metres_per_element(&self, line: usize) -> f64 {
        let line = line as f64;
        let axis = self.input_axis_len as f64;
        self.south_unit_distance_per_line * line + self.north_unit_distance_per_line * (axis - line)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// How one render is split into reading and computing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPlan {
    pub reading_tasks: usize,
    pub computing_tasks: usize,
    pub lines_per_task: usize,
    pub compute_tasks_per_reader: usize,
}

impl TaskPlan {
    /// Index of the first computing task owned by `reader_ix`.
    pub fn first_task(&self, reader_ix: usize) -> usize {
        self.compute_tasks_per_reader * reader_ix
    }

    /// One-past-the-last computing task owned by `reader_ix`; the final
    /// reader absorbs the remainder.
    pub fn last_task(&self, reader_ix: usize) -> usize {
        if reader_ix < self.reading_tasks - 1 {
            self.first_task(reader_ix) + self.compute_tasks_per_reader
        } else {
            self.computing_tasks
        }
    }

    /// Samples a non-first reader skips before reading: its stream must
    /// land on the row directly above its first data line, so the
    /// previous-row neighbours come from the stream rather than a
    /// hand-off buffer.
    pub fn skip_samples(&self, reader_ix: usize, line_buffer_size: usize) -> u64 {
        (self.lines_per_task * self.first_task(reader_ix) * line_buffer_size) as u64
    }
}

/// Decide the task decomposition for a render.
pub fn plan_tasks(
    input_axis_len: usize,
    reader_threads: usize,
    compute_threads: usize,
    elements_per_task: usize,
    fast_skip: bool,
) -> TaskPlan {
    // Sources without cheap skipping cannot feed independent streams.
    let extra_readers = if fast_skip { reader_threads } else { 0 };
    // Keep at least two lines per task so every non-trailing task has a
    // row to peel into the next task's line buffer.
    let reading_tasks = (1 + extra_readers).min((input_axis_len / 2).max(1));

    let determined = if compute_threads > 0 {
        ((input_axis_len * input_axis_len) / elements_per_task.max(1))
            .min(input_axis_len / 2)
            .max(1)
    } else {
        1
    };
    let computing_tasks = determined.max(reading_tasks);
    let lines_per_task = (input_axis_len / computing_tasks).max(1);
    let compute_tasks_per_reader = computing_tasks / reading_tasks;

    TaskPlan {
        reading_tasks,
        computing_tasks,
        lines_per_task,
        compute_tasks_per_reader,
    }
}

/// Multi-reader, multi-computer raster engine.
///
/// The pipeline itself is stateless across renders apart from the stop
/// flag; all per-render state lives in [`ComputingParams`].
pub struct RasterPipeline {
    reader_threads: usize,
    compute_threads: usize,
    elements_per_task: usize,
    stop: Arc<AtomicBool>,
}

impl RasterPipeline {
    pub fn new(reader_threads: usize, compute_threads: usize) -> Self {
        Self {
            reader_threads,
            compute_threads,
            elements_per_task: ELEMENTS_PER_TASK,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the unit-element budget per computing task.
    pub fn with_elements_per_task(mut self, elements_per_task: usize) -> Self {
        self.elements_per_task = elements_per_task;
        self
    }

    pub fn reader_threads(&self) -> usize {
        self.reader_threads
    }

    pub fn compute_threads(&self) -> usize {
        self.compute_threads
    }

    /// Active-task cap; readers throttle once this many computing tasks
    /// are queued or running.
    pub fn max_active_tasks(&self) -> usize {
        (1 + 2 * self.compute_threads) * (1 + self.reader_threads)
    }

    /// Ask all tasks of in-flight renders to wind down. Output produced
    /// after a stop is partial and meant to be discarded by the caller.
    pub fn stop_signal(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Allow new work after a stop.
    pub fn continue_signal(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Render one tile into a `(output_axis_len + 2·padding)²` byte grid.
    ///
    /// IO failures degrade rather than abort: a reader that cannot open
    /// or position its stream produces no output and the remaining
    /// readers still fill their rows.
    pub fn run(
        &self,
        info: &HgtFileInfo,
        input_axis_len: usize,
        output_axis_len: usize,
        padding: usize,
        resolution_factor: i32,
        kernel: Arc<dyn UnitKernel>,
    ) -> Vec<u8> {
        let output_width = output_axis_len + 2 * padding;
        let output = Arc::new(OutputGrid::new(output_width * output_width, output_width));

        if input_axis_len == 0 || self.is_stopped() {
            return match Arc::try_unwrap(output) {
                Ok(grid) => grid.into_bytes(),
                Err(shared) => shared.snapshot(),
            };
        }

        let line_buffer_size = input_axis_len + 1;
        let axis = input_axis_len as f64;
        let bounds = info.bounds();
        let north_unit = metres_per_degree_of_latitude(bounds.north_lat()) / axis / axis;
        let south_unit = metres_per_degree_of_latitude(bounds.south_lat()) / axis / axis;

        let plan = plan_tasks(
            input_axis_len,
            self.reader_threads,
            self.compute_threads,
            self.elements_per_task,
            info.file().supports_fast_skip(),
        );

        let max_active_tasks = self.max_active_tasks();
        let params = Arc::new(ComputingParams {
            output: Arc::clone(&output),
            kernel,
            input_axis_len,
            output_axis_len,
            output_width,
            line_buffer_size,
            padding,
            resolution_factor,
            north_unit_distance_per_line: north_unit,
            south_unit_distance_per_line: south_unit,
            compute_threads: self.compute_threads,
            max_active_tasks,
            active_tasks: AtomicIsize::new(0),
            input_pool: SampleBufferPool::new(1 + max_active_tasks),
            line_pool: SampleBufferPool::new(1 + max_active_tasks),
            stop: Arc::clone(&self.stop),
        });

        let pool_workers = self.reader_threads + self.compute_threads;
        let mut reader_handles = Vec::new();

        for reader_ix in 0..plan.reading_tasks {
            let task_from = plan.first_task(reader_ix);
            let task_to = plan.last_task(reader_ix);

            let stream = match info.file().open_stream() {
                Ok(stream) => Some(stream),
                Err(e) => {
                    tracing::error!(file = info.file().name(), error = %e, "cannot open DEM stream");
                    None
                }
            };
            let stream = stream.and_then(|mut stream| {
                if reader_ix == 0 {
                    return Some(stream);
                }
                let skip_bytes = 2 * plan.skip_samples(reader_ix, line_buffer_size);
                match stream.skip(skip_bytes) {
                    Ok(()) => Some(stream),
                    Err(e) => {
                        tracing::error!(file = info.file().name(), error = %e, "cannot position DEM stream");
                        None
                    }
                }
            });

            let context = ReaderContext {
                params: Arc::clone(&params),
                awaiter: Arc::new(Awaiter::new()),
                computing_tasks: plan.computing_tasks,
                task_from,
                task_to,
                lines_per_task: plan.lines_per_task,
                pool_workers,
            };

            if reader_ix < plan.reading_tasks - 1 {
                match caller_pool(pool_workers) {
                    Some(pool) => reader_handles
                        .push(pool.post_or_run(Box::new(move || run_reader(stream, context)))),
                    None => run_reader(stream, context),
                }
            } else {
                run_reader(stream, context);
            }
        }

        for handle in &reader_handles {
            handle.join();
        }

        drop(params);
        match Arc::try_unwrap(output) {
            Ok(grid) => grid.into_bytes(),
            Err(shared) => shared.snapshot(),
        }
    }
}

struct ReaderContext {
    params: Arc<ComputingParams>,
    awaiter: Arc<Awaiter>,
    computing_tasks: usize,
    task_from: usize,
    task_to: usize,
    lines_per_task: usize,
    pool_workers: usize,
}

/// One reading task: stream the rows for computing tasks
/// `[task_from, task_to)`, spawning each as its input becomes ready. The
/// trailing task reads the stream itself row by row, so the reader's last
/// slice needs no input strip at all.
fn run_reader(stream: Option<Box<dyn DemStream>>, context: ReaderContext) {
    let Some(mut stream) = stream else {
        return;
    };
    let params = &context.params;
    let input_axis_len = params.input_axis_len;
    let line_buffer_size = params.line_buffer_size;

    let mut compute_handles = Vec::new();
    let mut handed_off: Option<Vec<i16>> = None;

    for task_ix in context.task_from..context.task_to {
        pace_reading(params, &context.awaiter);

        let line_buffer = if task_ix == context.task_from {
            // First previous-row buffer comes straight off the stream.
            let mut line_buffer = vec![0i16; line_buffer_size];
            let mut last = 0i16;
            for slot in line_buffer.iter_mut() {
                last = read_or(&mut stream, last);
                *slot = last;
            }
            line_buffer
        } else {
            handed_off
                .take()
                .unwrap_or_else(|| vec![0i16; line_buffer_size])
        };

        let line_from = 1 + context.lines_per_task * task_ix;
        let line_to = if task_ix < context.computing_tasks - 1 {
            line_from + context.lines_per_task - 1
        } else {
            input_axis_len
        };

        if task_ix < context.task_to - 1 {
            let mut input = params
                .input_pool
                .get(line_buffer_size * (line_to - line_from + 1));
            let mut next_line_buffer = params.line_pool.get(line_buffer_size);
            let mut input_ix = 0;

            // First line substitutes no-data against the previous row.
            if !params.is_stopped() {
                while input_ix <= input_axis_len {
                    input[input_ix] = read_with_fallback(&mut stream, &line_buffer, input_ix, 0);
                    input_ix += 1;
                }
            }
            for _line in (line_from + 1)..line_to {
                if params.is_stopped() {
                    break;
                }
                // Inner loop, critical for performance.
                for _column in 0..=input_axis_len {
                    input[input_ix] =
                        read_with_fallback(&mut stream, &input, input_ix, line_buffer_size);
                    input_ix += 1;
                }
            }
            // Last line is peeled into a fresh buffer for the next task.
            if !params.is_stopped() {
                for column in 0..=input_axis_len {
                    let sample =
                        read_with_fallback(&mut stream, &input, input_ix, line_buffer_size);
                    input[input_ix] = sample;
                    next_line_buffer[column] = sample;
                    input_ix += 1;
                }
            }
            handed_off = Some(next_line_buffer);

            let task_params = Arc::clone(params);
            let task_awaiter = Arc::clone(&context.awaiter);
            let job: crate::pipeline::threadpool::Job = Box::new(move || {
                run_compute(
                    line_from,
                    line_to,
                    input,
                    line_buffer,
                    &task_params,
                    &task_awaiter,
                );
            });
            match caller_pool(context.pool_workers) {
                Some(pool) => compute_handles.push(pool.post_or_run(job)),
                None => job(),
            }
        } else {
            run_compute_streaming(
                line_from,
                line_to,
                &mut stream,
                line_buffer,
                params,
                &context.awaiter,
            );
        }
    }

    for handle in &compute_handles {
        handle.join();
    }
    // Stream closes on drop, on every exit path.
}

/// Throttle the reader while too many computing tasks are in flight.
fn pace_reading(params: &ComputingParams, awaiter: &Awaiter) {
    if params.compute_threads == 0 {
        return;
    }
    let limit = params.max_active_tasks as isize;
    if !increase_if_less(&params.active_tasks, limit) {
        tracing::debug!(
            active = params.active_tasks.load(Ordering::SeqCst),
            "raster reading paced"
        );
        awaiter.do_wait(|| increase_if_less(&params.active_tasks, limit));
    }
}

fn increase_if_less(counter: &AtomicIsize, limit: isize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            (current < limit).then_some(current + 1)
        })
        .is_ok()
}

/// Decrements the active-task counter and wakes the reader, also when the
/// task unwinds.
struct ActiveTaskGuard<'a> {
    params: &'a ComputingParams,
    awaiter: &'a Awaiter,
}

impl Drop for ActiveTaskGuard<'_> {
    fn drop(&mut self) {
        self.params.active_tasks.fetch_sub(1, Ordering::SeqCst);
        self.awaiter.do_notify();
    }
}

/// Starting output index for a task whose first data line is `line_from`.
fn initial_output_ix(params: &ComputingParams, line_from: usize) -> i64 {
    let width = params.output_width as i64;
    let padding = params.padding as i64;
    let base = width * padding + padding;
    let rows_before = if params.resolution_factor >= 1 {
        params.resolution_factor as i64 * (line_from as i64 - 1)
    } else {
        let divisor = i64::from(-params.resolution_factor);
        (line_from as i64 - 1) / divisor
    };
    base + rows_before * width
}

/// Output-index advance between input rows: skips both side paddings and,
/// when super-sampling, the extra output rows one input row expands into.
fn row_increment(params: &ComputingParams) -> i64 {
    let width = params.output_width as i64;
    let padding = params.padding as i64;
    let factor = if params.resolution_factor >= 1 {
        params.resolution_factor as i64
    } else {
        0
    };
    (factor - 1) * width + 2 * padding
}

/// Computing task over a pre-read input strip.
fn run_compute(
    line_from: usize,
    line_to: usize,
    input: Vec<i16>,
    line_buffer: Vec<i16>,
    params: &ComputingParams,
    awaiter: &Awaiter,
) {
    let _guard = ActiveTaskGuard { params, awaiter };
    let input_axis_len = params.input_axis_len;
    let kernel = &params.kernel;
    let increment = row_increment(params);
    let mut out_ix = initial_output_ix(params, line_from);

    let mut input_ix = 0;

    // First line reads its north neighbours from the line buffer.
    if !params.is_stopped() {
        let mut nw = f64::from(line_buffer[input_ix]);
        let mut sw = f64::from(input[input_ix]);
        input_ix += 1;
        let metres = params.metres_per_element(line_from);

        for col in 1..=input_axis_len {
            let ne = f64::from(line_buffer[input_ix]);
            let se = f64::from(input[input_ix]);
            input_ix += 1;

            out_ix = kernel.process_unit_element(
                nw,
                sw,
                se,
                ne,
                metres,
                out_ix as usize,
                line_from,
                col,
                params,
            ) as i64;

            nw = ne;
            sw = se;
        }
        out_ix += increment;
    }

    params.line_pool.recycle(line_buffer);

    let mut offset_ix = input_ix.saturating_sub(params.line_buffer_size);
    for line in (line_from + 1)..=line_to {
        if params.is_stopped() {
            break;
        }
        let mut nw = f64::from(input[offset_ix]);
        offset_ix += 1;
        let mut sw = f64::from(input[input_ix]);
        input_ix += 1;
        let metres = params.metres_per_element(line);

        // Inner loop, critical for performance.
        for col in 1..=input_axis_len {
            let ne = f64::from(input[offset_ix]);
            offset_ix += 1;
            let se = f64::from(input[input_ix]);
            input_ix += 1;

            out_ix = kernel.process_unit_element(
                nw,
                sw,
                se,
                ne,
                metres,
                out_ix as usize,
                line,
                col,
                params,
            ) as i64;

            nw = ne;
            sw = se;
        }
        out_ix += increment;
    }

    params.input_pool.recycle(input);
}

/// Memory-optimised trailing task: reads its rows straight off the
/// reader's stream, cycling a single line buffer.
fn run_compute_streaming(
    line_from: usize,
    line_to: usize,
    stream: &mut Box<dyn DemStream>,
    mut line_buffer: Vec<i16>,
    params: &ComputingParams,
    awaiter: &Awaiter,
) {
    let _guard = ActiveTaskGuard { params, awaiter };
    let input_axis_len = params.input_axis_len;
    let kernel = &params.kernel;
    let increment = row_increment(params);
    let mut out_ix = initial_output_ix(params, line_from);

    let mut buffer_ix = 0;
    for line in line_from..=line_to {
        if params.is_stopped() {
            break;
        }
        if buffer_ix >= params.line_buffer_size {
            buffer_ix = 0;
        }

        let nw_sample = line_buffer[buffer_ix];
        let sw_sample = read_or(stream, nw_sample);
        line_buffer[buffer_ix] = sw_sample;
        buffer_ix += 1;

        let mut nw = f64::from(nw_sample);
        let mut sw = f64::from(sw_sample);
        let metres = params.metres_per_element(line);

        // Inner loop, critical for performance.
        for col in 1..=input_axis_len {
            let ne_sample = line_buffer[buffer_ix];
            let se_sample = read_or(stream, ne_sample);
            line_buffer[buffer_ix] = se_sample;
            buffer_ix += 1;

            let ne = f64::from(ne_sample);
            let se = f64::from(se_sample);

            out_ix = kernel.process_unit_element(
                nw,
                sw,
                se,
                ne,
                metres,
                out_ix as usize,
                line,
                col,
                params,
            ) as i64;

            nw = ne;
            sw = se;
        }
        out_ix += increment;
    }

    params.line_pool.recycle(line_buffer);
}

/// Read one big-endian sample; substitute `fallback_arr[ix - delta]` on
/// end-of-stream or the no-data sentinel. A delta of the row length
/// substitutes the sample one row up; zero substitutes from the previous
/// row still held in the fallback buffer at the same column.
fn read_with_fallback(
    stream: &mut Box<dyn DemStream>,
    fallback_arr: &[i16],
    ix: usize,
    delta: usize,
) -> i16 {
    match read_raw(stream) {
        Some(sample) if sample != NO_DATA_VALUE => sample,
        _ => fallback_arr[ix - delta],
    }
}

/// Read one big-endian sample; substitute `fallback` on end-of-stream or
/// the no-data sentinel.
fn read_or(stream: &mut Box<dyn DemStream>, fallback: i16) -> i16 {
    match read_raw(stream) {
        Some(sample) if sample != NO_DATA_VALUE => sample,
        _ => fallback,
    }
}

fn read_raw(stream: &mut Box<dyn DemStream>) -> Option<i16> {
    let mut raw = [0u8; 2];
    match stream.read_exact(&mut raw) {
        Ok(()) => Some(i16::from_be_bytes(raw)),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct SliceStream(std::io::Cursor<Vec<u8>>);

    impl Read for SliceStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl DemStream for SliceStream {}

    fn stream_of(samples: &[i16]) -> Box<dyn DemStream> {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();
        Box::new(SliceStream(std::io::Cursor::new(bytes)))
    }

    #[test]
    fn test_read_with_fallback_passes_real_samples() {
        let mut stream = stream_of(&[123, 456]);
        let fallback = [7i16, 8, 9];
        assert_eq!(read_with_fallback(&mut stream, &fallback, 2, 0), 123);
        assert_eq!(read_with_fallback(&mut stream, &fallback, 2, 2), 456);
    }

    #[test]
    fn test_read_with_fallback_substitutes_sentinel() {
        let mut stream = stream_of(&[NO_DATA_VALUE]);
        let fallback = [7i16, 8, 9];
        // Delta of the row length substitutes one row up.
        assert_eq!(read_with_fallback(&mut stream, &fallback, 2, 2), 7);
    }

    #[test]
    fn test_read_with_fallback_substitutes_on_eof() {
        let mut stream = stream_of(&[]);
        let fallback = [7i16, 8, 9];
        assert_eq!(read_with_fallback(&mut stream, &fallback, 1, 0), 8);
    }

    #[test]
    fn test_read_or_fallback_value() {
        let mut stream = stream_of(&[44, NO_DATA_VALUE]);
        assert_eq!(read_or(&mut stream, 5), 44);
        assert_eq!(read_or(&mut stream, 5), 5);
        assert_eq!(read_or(&mut stream, 6), 6);
    }

    #[test]
    fn test_plan_matches_documented_decomposition() {
        // L=1200 with one extra reader and a 360k element budget gives
        // two readers owning two compute tasks each.
        let plan = plan_tasks(1200, 1, 1, 360_000, true);
        assert_eq!(plan.reading_tasks, 2);
        assert_eq!(plan.computing_tasks, 4);
        assert_eq!(plan.lines_per_task, 300);
        assert_eq!(plan.compute_tasks_per_reader, 2);
        // Second reader starts at compute task 2 = line 601, so it skips
        // the 600 rows above its previous-row line.
        assert_eq!(plan.skip_samples(1, 1201), 600 * 1201);
    }

    #[test]
    fn test_plan_default_element_budget() {
        let plan = plan_tasks(1200, 1, 1, ELEMENTS_PER_TASK, true);
        assert_eq!(plan.reading_tasks, 2);
        assert_eq!(plan.computing_tasks, 90);
        assert_eq!(plan.lines_per_task, 13);
    }

    #[test]
    fn test_plan_forces_single_reader_without_fast_skip() {
        let plan = plan_tasks(1200, 3, 2, ELEMENTS_PER_TASK, false);
        assert_eq!(plan.reading_tasks, 1);
    }

    #[test]
    fn test_plan_single_task_when_no_compute_threads_or_readers() {
        let plan = plan_tasks(1200, 0, 0, ELEMENTS_PER_TASK, true);
        assert_eq!(plan.reading_tasks, 1);
        assert_eq!(plan.computing_tasks, 1);
        assert_eq!(plan.lines_per_task, 1200);
    }

    #[test]
    fn test_plan_clamps_readers_for_tiny_tiles() {
        // Every task must own at least two lines.
        let plan = plan_tasks(4, 7, 1, ELEMENTS_PER_TASK, true);
        assert!(plan.reading_tasks <= 2);
        assert!(plan.lines_per_task >= 2 || plan.computing_tasks == 1);
    }

    #[test]
    fn test_max_active_tasks_formula() {
        let pipeline = RasterPipeline::new(1, 1);
        assert_eq!(pipeline.max_active_tasks(), (1 + 2) * (1 + 1));
        let pipeline = RasterPipeline::new(2, 3);
        assert_eq!(pipeline.max_active_tasks(), (1 + 6) * (1 + 2));
    }

    #[test]
    fn test_increase_if_less_stops_at_limit() {
        let counter = AtomicIsize::new(0);
        assert!(increase_if_less(&counter, 2));
        assert!(increase_if_less(&counter, 2));
        assert!(!increase_if_less(&counter, 2));
        counter.fetch_sub(1, Ordering::SeqCst);
        assert!(increase_if_less(&counter, 2));
    }

    #[test]
    fn test_stop_signal_round_trip() {
        let pipeline = RasterPipeline::new(1, 1);
        assert!(!pipeline.is_stopped());
        pipeline.stop_signal();
        assert!(pipeline.is_stopped());
        pipeline.continue_signal();
        assert!(!pipeline.is_stopped());
    }
}
