use std::{cell::RefCell, mem, rc::Rc};

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{BreakpointAction, CatchClause, DebugAction, ExprSrc, Operand, StdlibCall, Stmt, StmtKind},
    concurrency::Simulator,
    debugger::{AutoContinue, DebugCommand, DebugHandler, Debugger},
    diagnostics::{OsierError, Result},
    environment::{CallStack, ScopeStack, MAX_CALL_DEPTH},
    expr,
    memory::{Handle, MemoryFault, MemorySubsystem, Space},
    parser,
    stdlib::{self, HostState, Registry},
    value::{ClassDef, FunctionDef, ObjectInstance, Value, ValueKind},
};

/// Everything one engine call made observable.
#[derive(Debug, Default)]
pub struct Outcome {
    pub output: Vec<String>,
    pub value: Option<Value>,
    pub error: Option<OsierError>,
}

/// Errors travel in the `Err` channel so `?` unwinds to the nearest `try`.
enum Flow {
    Next,
    Value(Value),
    Return(Value),
}

pub struct Interpreter {
    scopes: ScopeStack,
    calls: CallStack,
    memory: MemorySubsystem,
    sim: Simulator,
    registry: Registry,
    host: HostState,
    debugger: Debugger,
    handler: Box<dyn DebugHandler>,
    out: Vec<String>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            scopes: ScopeStack::new(),
            calls: CallStack::new(),
            memory: MemorySubsystem::new(),
            sim: Simulator::new(),
            registry: stdlib::install(),
            host: HostState::new(),
            debugger: Debugger::new(),
            handler: Box::new(AutoContinue),
            out: Vec::new(),
        }
    }

    pub fn run(&mut self, source: &str) -> Outcome {
        let parsed = parser::parse(source);
        if !parsed.errors.is_empty() {
            let mut outcome = Outcome::default();
            for err in &parsed.errors {
                outcome
                    .output
                    .push(format!("Syntax error (line {}): {}", err.line, err.message));
            }
            outcome.error = parsed.errors.into_iter().next().map(OsierError::from);
            return outcome;
        }
        self.execute_batch(&parsed.statements)
    }

    /// A block header must arrive in the same call as its body.
    pub fn execute_line(&mut self, line: &str, line_number: usize) -> Outcome {
        let offset = line_number.saturating_sub(1);
        let parsed = parser::parse(line);
        if !parsed.errors.is_empty() {
            let mut outcome = Outcome::default();
            for err in &parsed.errors {
                outcome.output.push(format!(
                    "Syntax error (line {}): {}",
                    err.line + offset,
                    err.message
                ));
            }
            outcome.error = parsed.errors.into_iter().next().map(|mut err| {
                err.line += offset;
                OsierError::from(err)
            });
            return outcome;
        }
        let mut statements = parsed.statements;
        for stmt in &mut statements {
            shift_lines(stmt, offset);
        }
        self.execute_batch(&statements)
    }

    /// Breakpoints, the debug handler, and the seeded RNG survive a reset.
    pub fn reset(&mut self) {
        self.scopes = ScopeStack::new();
        self.calls = CallStack::new();
        self.memory = MemorySubsystem::new();
        self.sim = Simulator::new();
        self.out.clear();
        self.host.exit_code = None;
        self.debugger.set_step(false);
        self.debugger.resume();
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debugger.set_enabled(enabled);
    }

    pub fn set_breakpoint(&mut self, line: usize) {
        self.debugger.set_breakpoint(line);
    }

    pub fn clear_breakpoint(&mut self, line: usize) -> bool {
        self.debugger.clear_breakpoint(line)
    }

    pub fn clear_breakpoints(&mut self) {
        self.debugger.clear_all();
    }

    pub fn list_breakpoints(&self) -> Vec<usize> {
        self.debugger.breakpoints()
    }

    pub fn step(&mut self) {
        self.debugger.set_step(true);
    }

    pub fn continue_(&mut self) {
        self.debugger.set_step(false);
    }

    pub fn inspect_variables(&self) -> String {
        let visible = self.scopes.visible();
        if visible.is_empty() {
            return "(no variables)".to_string();
        }
        let lines: Vec<String> = visible
            .iter()
            .map(|(name, value)| format!("{name} = {value:?}"))
            .collect();
        lines.join("\n")
    }

    pub fn inspect_call_stack(&self) -> String {
        let frames = self.calls.frames();
        if frames.is_empty() {
            return "(no active calls)".to_string();
        }
        frames
            .iter()
            .rev()
            .enumerate()
            .map(|(depth, name)| format!("#{depth} {name}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn inspect_memory(&self) -> String {
        let stats = self.memory.stats();
        format!(
            "heap: {} allocation(s), vmem: {}, pages: {}, swap: {}, stack depth: {}",
            stats.heap, stats.vmem, stats.pages, stats.swap, stats.stack
        )
    }

    pub fn set_debug_handler(&mut self, handler: Box<dyn DebugHandler>) {
        self.handler = handler;
    }

    pub fn seed_random(&mut self, seed: u64) {
        self.host.seed(seed);
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.host.exit_code
    }

    fn execute_batch(&mut self, statements: &[Stmt]) -> Outcome {
        let mut outcome = Outcome::default();
        for stmt in statements {
            match self.execute_statement(stmt) {
                Ok(Flow::Next) => {}
                Ok(Flow::Value(value)) | Ok(Flow::Return(value)) => {
                    outcome.value = Some(value);
                }
                Err(err) => {
                    self.out.push(format!("Error (line {}): {err}", stmt.line));
                    if outcome.error.is_none() {
                        outcome.error = Some(err);
                    }
                }
            }
            if self.host.exit_code.is_some() {
                break;
            }
        }
        outcome.output = mem::take(&mut self.out);
        outcome
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.debugger.note_line(stmt.line);
        if self.debugger.should_pause(stmt.line) {
            self.pause_on(stmt);
        }
        match &stmt.kind {
            StmtKind::Assign { name, value } => {
                let value = self.operand_value(value)?;
                self.scopes.define(name.clone(), value);
                Ok(Flow::Next)
            }
            StmtKind::Print { operands } => {
                let mut pieces = Vec::with_capacity(operands.len());
                for operand in operands {
                    pieces.push(self.operand_value(operand)?.to_string());
                }
                self.out.push(pieces.join(" "));
                Ok(Flow::Next)
            }
            StmtKind::If { condition, body } => {
                if self.condition(condition)? {
                    self.run_block(body)
                } else {
                    Ok(Flow::Next)
                }
            }
            StmtKind::While { condition, body } => {
                while self.condition(condition)? {
                    if let Flow::Return(value) = self.run_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                    if self.host.exit_code.is_some() {
                        break;
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::FunctionDef { name, params, body } => {
                let function = FunctionDef {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                };
                self.scopes.define(name.clone(), Value::function(function));
                Ok(Flow::Next)
            }
            StmtKind::ClassDef { name, body } => self.define_class(name, body),
            StmtKind::Call { name, args } => {
                let value = self.call_function(name, args)?;
                Ok(Flow::Value(value))
            }
            StmtKind::Return { value } => {
                let value = match value {
                    Some(operand) => self.operand_value(operand)?,
                    None => Value::none(),
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => self.run_try(body, catch.as_ref(), finally.as_deref()),
            StmtKind::Throw { value } => {
                let value = self.operand_value(value)?;
                Err(OsierError::thrown(value.to_string()))
            }
            StmtKind::Import { target } => {
                self.out
                    .push(format!("import '{target}' is not supported"));
                Ok(Flow::Next)
            }
            StmtKind::Export { target } => {
                self.out
                    .push(format!("export '{target}' is not supported"));
                Ok(Flow::Next)
            }
            StmtKind::Alloc { space, name, size } => {
                let size = self.size_value(size)?;
                let handle = self.memory.allocate(*space, size);
                self.scopes.define(name.clone(), Value::handle(handle));
                Ok(Flow::Next)
            }
            StmtKind::Free { space, name } => {
                let handle = self.handle_of(name, *space)?;
                self.memory.free(&handle)?;
                Ok(Flow::Next)
            }
            StmtKind::MemoryRead { name, index } => {
                let handle = self.handle_of(name, None)?;
                let index = self.index_value(index)?;
                let value = self.memory.read(&handle, index)?;
                Ok(Flow::Value(value))
            }
            StmtKind::MemoryWrite { name, index, value } => {
                let handle = self.handle_of(name, None)?;
                let index = self.index_value(index)?;
                let value = self.operand_value(value)?;
                self.memory.write(&handle, index, value)?;
                Ok(Flow::Next)
            }
            StmtKind::SwapOut { name } => {
                let handle = self.handle_of(name, None)?;
                self.memory.swap_out(&handle)?;
                Ok(Flow::Next)
            }
            StmtKind::SwapIn { name } => {
                let handle = self.handle_of(name, None)?;
                self.memory.swap_in(&handle)?;
                Ok(Flow::Next)
            }
            StmtKind::StackPush { value } => {
                let value = self.operand_value(value)?;
                self.memory.push(value);
                Ok(Flow::Next)
            }
            StmtKind::StackPop => {
                let value = self.memory.pop()?;
                Ok(Flow::Value(value))
            }
            StmtKind::GcRun => {
                let collected = self.collect_garbage();
                self.out.push(format!("GC collected {collected} allocation(s)"));
                Ok(Flow::Next)
            }
            StmtKind::ThreadCreate { name } => {
                self.sim.create_thread(name)?;
                Ok(Flow::Next)
            }
            StmtKind::ThreadJoin { name } => {
                self.sim.join_thread(name)?;
                Ok(Flow::Next)
            }
            StmtKind::LockAcquire { name } => {
                self.sim.acquire_lock(name);
                Ok(Flow::Next)
            }
            StmtKind::LockRelease { name } => {
                self.sim.release_lock(name)?;
                Ok(Flow::Next)
            }
            StmtKind::TaskSchedule {
                name,
                delay,
                priority,
            } => {
                self.sim.schedule_task(name, *delay, *priority);
                Ok(Flow::Next)
            }
            StmtKind::TaskStart => {
                for task in self.sim.start_tasks() {
                    self.out.push(format!(
                        "Running task '{}' (delay {}s, priority {})",
                        task.name, task.delay_seconds, task.priority
                    ));
                }
                Ok(Flow::Next)
            }
            StmtKind::ProcessCreate { name, priority } => {
                self.sim.create_process(name, *priority)?;
                Ok(Flow::Next)
            }
            StmtKind::ProcessTerminate { name } => {
                self.sim.terminate_process(name)?;
                Ok(Flow::Next)
            }
            StmtKind::ObjectNew { name, class } => {
                let class_value = self.lookup(class)?;
                let class_def = match &*class_value.0 {
                    ValueKind::Class(def) => Rc::clone(def),
                    _ => {
                        return Err(OsierError::type_error(format!("`{class}` is not a class")))
                    }
                };
                let instance = ObjectInstance {
                    attributes: class_def.attributes.clone(),
                    class: class_def,
                };
                self.scopes.define(name.clone(), Value::object(instance));
                Ok(Flow::Next)
            }
            StmtKind::ObjectSet {
                name,
                attribute,
                value,
            } => {
                let object = self.object_of(name)?;
                let value = self.operand_value(value)?;
                object.borrow_mut().attributes.insert(attribute.clone(), value);
                Ok(Flow::Next)
            }
            StmtKind::ObjectGet { name, attribute } => {
                let value = self.attribute_of(name, attribute)?;
                Ok(Flow::Value(value))
            }
            StmtKind::MethodCall {
                object,
                method,
                args,
            } => {
                let value = self.call_method(object, method, args)?;
                Ok(Flow::Value(value))
            }
            StmtKind::StdlibCall(call) => {
                let value = self.stdlib_call(call)?;
                Ok(Flow::Value(value))
            }
            StmtKind::DebugCmd(action) => {
                match action {
                    DebugAction::On => self.debugger.set_enabled(true),
                    DebugAction::Off => self.debugger.set_enabled(false),
                    DebugAction::Step => self.debugger.set_step(true),
                    DebugAction::Continue => self.debugger.set_step(false),
                    DebugAction::Variables => {
                        let text = self.inspect_variables();
                        self.out.push(text);
                    }
                    DebugAction::CallStack => {
                        let text = self.inspect_call_stack();
                        self.out.push(text);
                    }
                    DebugAction::Memory => {
                        let text = self.inspect_memory();
                        self.out.push(text);
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::BreakpointCmd(action) => {
                match action {
                    BreakpointAction::Set(line) => self.debugger.set_breakpoint(*line),
                    BreakpointAction::Clear(line) => {
                        self.debugger.clear_breakpoint(*line);
                    }
                    BreakpointAction::ClearAll => self.debugger.clear_all(),
                    BreakpointAction::List => {
                        let breakpoints = self.debugger.breakpoints();
                        if breakpoints.is_empty() {
                            self.out.push("No breakpoints set".to_string());
                        } else {
                            let listed: Vec<String> =
                                breakpoints.iter().map(usize::to_string).collect();
                            self.out.push(format!("Breakpoints: {}", listed.join(", ")));
                        }
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::Unknown => {
                self.out
                    .push(format!("Unknown command (line {}): {}", stmt.line, stmt.raw));
                Ok(Flow::Next)
            }
        }
    }

    fn run_block(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute_statement(stmt)? {
                return Ok(Flow::Return(value));
            }
            if self.host.exit_code.is_some() {
                break;
            }
        }
        Ok(Flow::Next)
    }

    fn pause_on(&mut self, stmt: &Stmt) {
        self.debugger.pause();
        loop {
            match self.handler.on_pause(stmt.line, &stmt.raw) {
                DebugCommand::Continue => {
                    self.debugger.set_step(false);
                    break;
                }
                DebugCommand::Step => {
                    self.debugger.set_step(true);
                    break;
                }
                DebugCommand::Variables => {
                    let text = self.inspect_variables();
                    self.handler.show(&text);
                }
                DebugCommand::CallStack => {
                    let text = self.inspect_call_stack();
                    self.handler.show(&text);
                }
                DebugCommand::Memory => {
                    let text = self.inspect_memory();
                    self.handler.show(&text);
                }
                DebugCommand::Quit => {
                    self.debugger.set_enabled(false);
                    break;
                }
            }
        }
        self.debugger.resume();
    }

    fn run_try(
        &mut self,
        body: &[Stmt],
        catch: Option<&CatchClause>,
        finally: Option<&[Stmt]>,
    ) -> Result<Flow> {
        let mut result = self.run_block(body);
        if let Err(err) = result {
            result = match catch {
                Some(clause) => {
                    if let Some(binding) = &clause.binding {
                        self.scopes.define(binding.clone(), Value::string(err.to_string()));
                    }
                    self.run_block(&clause.body)
                }
                None => Err(err),
            };
        }
        if let Some(finally_body) = finally {
            if let Flow::Return(value) = self.run_block(finally_body)? {
                return Ok(Flow::Return(value));
            }
        }
        result
    }

    fn define_class(&mut self, name: &str, body: &[Stmt]) -> Result<Flow> {
        let mut attributes = IndexMap::new();
        let mut methods = IndexMap::new();
        for stmt in body {
            match &stmt.kind {
                StmtKind::FunctionDef {
                    name: method_name,
                    params,
                    body: method_body,
                } => {
                    methods.insert(
                        method_name.clone(),
                        Rc::new(FunctionDef {
                            name: method_name.clone(),
                            params: params.clone(),
                            body: method_body.clone(),
                        }),
                    );
                }
                StmtKind::Assign {
                    name: attr_name,
                    value,
                } => {
                    let value = self.operand_value(value)?;
                    attributes.insert(attr_name.clone(), value);
                }
                _ => {
                    return Err(OsierError::type_error(format!(
                        "class `{name}` bodies may only contain attributes and methods"
                    )))
                }
            }
        }
        let class = ClassDef {
            name: name.to_string(),
            attributes,
            methods,
        };
        self.scopes.define(name.to_string(), Value::class(Rc::new(class)));
        Ok(Flow::Next)
    }

    fn call_function(&mut self, name: &str, args: &[ExprSrc]) -> Result<Value> {
        let value = self
            .scopes
            .get(name)
            .cloned()
            .ok_or_else(|| OsierError::name(format!("undefined function `{name}`")))?;
        let function = match &*value.0 {
            ValueKind::Function(def) => Rc::clone(def),
            _ => return Err(OsierError::type_error(format!("`{name}` is not callable"))),
        };
        let arguments = self.argument_values(args);
        self.invoke(&function, None, arguments)
    }

    fn call_method(&mut self, object: &str, method: &str, args: &[ExprSrc]) -> Result<Value> {
        let instance = self.object_of(object)?;
        let function = {
            let borrowed = instance.borrow();
            borrowed.class.methods.get(method).cloned().ok_or_else(|| {
                OsierError::name(format!(
                    "class `{}` has no method `{method}`",
                    borrowed.class.name
                ))
            })?
        };
        let arguments = self.argument_values(args);
        let receiver = Value::new(ValueKind::Object(Rc::clone(&instance)));
        self.invoke(&function, Some(receiver), arguments)
    }

    fn invoke(
        &mut self,
        function: &Rc<FunctionDef>,
        receiver: Option<Value>,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        if function.params.len() != arguments.len() {
            return Err(OsierError::Arity {
                name: function.name.clone(),
                expected: function.params.len(),
                received: arguments.len(),
            });
        }
        if self.calls.depth() >= MAX_CALL_DEPTH {
            return Err(OsierError::type_error(format!(
                "call depth limit of {MAX_CALL_DEPTH} exceeded calling `{}`",
                function.name
            )));
        }
        self.scopes.push();
        self.calls.push(function.name.clone());
        if let Some(receiver) = receiver {
            self.scopes.define("self", receiver);
        }
        for (param, argument) in function.params.iter().zip(arguments) {
            self.scopes.define(param.clone(), argument);
        }
        let result = self.run_block(&function.body);
        self.calls.pop();
        self.scopes.pop();
        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::none()),
        }
    }

    fn stdlib_call(&mut self, call: &StdlibCall) -> Result<Value> {
        let function = self
            .registry
            .lookup(&call.namespace, &call.function)
            .ok_or_else(|| {
                OsierError::name(format!(
                    "unknown stdlib function `{}.{}`",
                    call.namespace, call.function
                ))
            })?;
        let arguments = self.argument_values(&call.args);
        Ok(function(&mut self.host, &arguments))
    }

    fn argument_values(&self, args: &[ExprSrc]) -> Vec<Value> {
        args.iter().map(|arg| self.soft_eval(arg)).collect()
    }

    fn operand_value(&mut self, operand: &Operand) -> Result<Value> {
        match operand {
            Operand::StringLit(text) => Ok(Value::string(text.clone())),
            Operand::MemoryRead { name, index } => {
                let handle = self.handle_of(name, None)?;
                let index = self.index_value(index)?;
                Ok(self.memory.read(&handle, index)?)
            }
            Operand::ObjectGet { name, attribute } => self.attribute_of(name, attribute),
            Operand::StdlibCall(call) => self.stdlib_call(call),
            Operand::Expr(src) => Ok(self.soft_eval(src)),
        }
    }

    /// An operand that does not evaluate becomes its own source text.
    fn soft_eval(&self, src: &ExprSrc) -> Value {
        match expr::evaluate(&src.tokens, &self.scopes) {
            Ok(value) => value,
            Err(_) => Value::string(src.raw.clone()),
        }
    }

    fn condition(&self, src: &ExprSrc) -> Result<bool> {
        let value = expr::evaluate(&src.tokens, &self.scopes).map_err(|failure| {
            OsierError::type_error(format!(
                "condition `{}` cannot be evaluated: {}",
                src.raw, failure.reason
            ))
        })?;
        Ok(value.is_truthy())
    }

    fn size_value(&self, src: &ExprSrc) -> Result<usize> {
        let value = self.hard_eval(src, "allocation size")?;
        match value.as_number() {
            Some(n) if n >= 0.0 => Ok(n.trunc() as usize),
            _ => Err(OsierError::type_error(format!(
                "invalid allocation size `{}`",
                src.raw
            ))),
        }
    }

    fn index_value(&self, src: &ExprSrc) -> Result<i64> {
        let value = self.hard_eval(src, "index")?;
        match value.as_number() {
            Some(n) => Ok(n.trunc() as i64),
            None => Err(OsierError::type_error(format!("invalid index `{}`", src.raw))),
        }
    }

    fn hard_eval(&self, src: &ExprSrc, what: &str) -> Result<Value> {
        expr::evaluate(&src.tokens, &self.scopes).map_err(|failure| {
            OsierError::type_error(format!(
                "{what} `{}` cannot be evaluated: {}",
                src.raw, failure.reason
            ))
        })
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        self.scopes
            .get(name)
            .cloned()
            .ok_or_else(|| OsierError::name(format!("undefined variable `{name}`")))
    }

    fn handle_of(&self, name: &str, expected: Option<Space>) -> Result<Handle> {
        let value = self.lookup(name)?;
        let handle = value.as_handle().copied().ok_or_else(|| {
            OsierError::type_error(format!("`{name}` does not hold a memory handle"))
        })?;
        if let Some(space) = expected {
            if handle.space != space {
                return Err(MemoryFault::WrongSpace {
                    expected: space,
                    actual: handle.space,
                }
                .into());
            }
        }
        Ok(handle)
    }

    fn object_of(&self, name: &str) -> Result<Rc<RefCell<ObjectInstance>>> {
        let value = self.lookup(name)?;
        match &*value.0 {
            ValueKind::Object(instance) => Ok(Rc::clone(instance)),
            _ => Err(OsierError::type_error(format!("`{name}` is not an object"))),
        }
    }

    fn attribute_of(&self, name: &str, attribute: &str) -> Result<Value> {
        let object = self.object_of(name)?;
        let borrowed = object.borrow();
        borrowed.attributes.get(attribute).cloned().ok_or_else(|| {
            OsierError::name(format!("object `{name}` has no attribute `{attribute}`"))
        })
    }

    /// Reachability is defined over variable bindings.
    fn collect_garbage(&mut self) -> usize {
        let mut live = IndexSet::new();
        for value in self.scopes.iter_values() {
            mark_value(value, &mut live);
        }
        self.memory.sweep(&live)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn mark_value(value: &Value, live: &mut IndexSet<(Space, u64)>) {
    match &*value.0 {
        ValueKind::Handle(handle) => {
            live.insert((handle.space, handle.id));
        }
        ValueKind::List(values) => {
            for value in values {
                mark_value(value, live);
            }
        }
        ValueKind::Map(map) => {
            for value in map.values() {
                mark_value(value, live);
            }
        }
        ValueKind::Object(instance) => {
            for value in instance.borrow().attributes.values() {
                mark_value(value, live);
            }
        }
        ValueKind::Class(class) => {
            for value in class.attributes.values() {
                mark_value(value, live);
            }
        }
        _ => {}
    }
}

fn shift_lines(stmt: &mut Stmt, offset: usize) {
    stmt.line += offset;
    match &mut stmt.kind {
        StmtKind::If { body, .. }
        | StmtKind::While { body, .. }
        | StmtKind::FunctionDef { body, .. }
        | StmtKind::ClassDef { body, .. } => {
            for child in body {
                shift_lines(child, offset);
            }
        }
        StmtKind::Try {
            body,
            catch,
            finally,
        } => {
            for child in body {
                shift_lines(child, offset);
            }
            if let Some(clause) = catch {
                for child in &mut clause.body {
                    shift_lines(child, offset);
                }
            }
            if let Some(finally_body) = finally {
                for child in finally_body {
                    shift_lines(child, offset);
                }
            }
        }
        _ => {}
    }
}
